//! Transmission: one info delivered to one destination.

use serde::{Deserialize, Serialize};
use super::{entity_id, InfoId, NodeId, Timestamp};

entity_id!(
    /// Opaque transmission identifier.
    TransmissionId
);

/// A logical delivery record.
///
/// The origin is not stored: it is the origin of the referenced info, and
/// the implied vector is (info origin → destination).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transmission {
    pub id: TransmissionId,
    pub info: InfoId,
    pub destination: NodeId,
    pub transmit_time: Timestamp,
    pub receive_time: Option<Timestamp>,
}

impl Transmission {
    pub fn new(info: InfoId, destination: NodeId, transmit_time: Timestamp) -> Self {
        Self {
            id: TransmissionId::new(),
            info,
            destination,
            transmit_time,
            receive_time: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.receive_time.is_none()
    }

    /// Overwrites any earlier receive time.
    pub fn mark_received(&mut self, now: Timestamp) {
        self.receive_time = Some(now);
    }
}

impl std::fmt::Display for Transmission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Transmission-{}", self.id.short())
    }
}
