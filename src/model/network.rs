//! Network: a typed grouping of nodes.

use serde::{Deserialize, Serialize};
use super::{entity_id, Timestamp};

entity_id!(
    /// Opaque network identifier.
    NetworkId
);

/// Network type tag. Decides how `add_agent` wires a newcomer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkKind {
    /// No automatic wiring.
    Base,
    /// Each agent receives from the agent added before it.
    Chain,
    /// Every pair of agents is connected both ways.
    FullyConnected,
    /// The first agent is a hub connected both ways with every other agent.
    Star,
}

impl std::fmt::Display for NetworkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            NetworkKind::Base => "base",
            NetworkKind::Chain => "chain",
            NetworkKind::FullyConnected => "fully_connected",
            NetworkKind::Star => "star",
        })
    }
}

/// A network record.
///
/// Membership is not stored here: nodes point at their network, and
/// vectors inherit the network of their origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Network {
    pub id: NetworkId,
    pub kind: NetworkKind,
    pub creation_time: Timestamp,
}

impl Network {
    pub fn new(kind: NetworkKind, creation_time: Timestamp) -> Self {
        Self { id: NetworkId::new(), kind, creation_time }
    }
}
