//! # Experiment Graph Model
//!
//! Clean DTOs that define the information-propagation graph.
//! These types cross every boundary: storage ↔ ops ↔ behavior ↔ user.
//!
//! Design rule: NO store handles, NO transactions here.
//! This module is pure data: no I/O, no async. The only logic it holds
//! is field-level: write-once contents and one-way status transitions.

pub mod clock;
pub mod node;
pub mod vector;
pub mod info;
pub mod transmission;
pub mod transformation;
pub mod network;

pub use clock::{Clock, Timestamp};
pub use node::{Node, NodeId, NodeKind, NodeRole, NodeFilter, NodeStatus};
pub use vector::{Vector, VectorId, VectorStatus};
pub use info::{Info, InfoId, InfoFilter};
pub use transmission::{Transmission, TransmissionId};
pub use transformation::{Transformation, TransformationId};
pub use network::{Network, NetworkId, NetworkKind};

/// Declare an opaque UUID-backed identifier for one entity kind.
///
/// Ids display as 32-char lowercase hex, and `short()` gives the
/// 6-char prefix used in `Display` impls of the entities themselves.
macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
            serde::Serialize, serde::Deserialize,
        )]
        pub struct $name(pub uuid::Uuid);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// First six hex characters.
            pub fn short(&self) -> String {
                let mut s = self.to_string();
                s.truncate(6);
                s
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0.simple())
            }
        }
    };
}

pub(crate) use entity_id;
