//! Vector (directed edge) in the experiment graph.

use serde::{Deserialize, Serialize};
use super::{entity_id, NodeId, Timestamp};

entity_id!(
    /// Opaque vector identifier.
    VectorId
);

/// Edge status. `Dead` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorStatus {
    Alive,
    Dead,
}

/// A directed edge: the only legal path for a transmission.
///
/// A vector has no network of its own; it belongs to whatever network its
/// origin node belongs to. Parallel edges between the same pair are
/// distinct vectors, and self-loops are allowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vector {
    pub id: VectorId,
    pub origin: NodeId,
    pub destination: NodeId,
    pub creation_time: Timestamp,
    pub status: VectorStatus,
    pub time_of_death: Option<Timestamp>,
}

impl Vector {
    pub fn new(origin: NodeId, destination: NodeId, creation_time: Timestamp) -> Self {
        Self {
            id: VectorId::new(),
            origin,
            destination,
            creation_time,
            status: VectorStatus::Alive,
            time_of_death: None,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.status == VectorStatus::Alive
    }

    /// Returns false if the vector was already dead.
    pub fn mark_dead(&mut self, now: Timestamp) -> bool {
        if !self.is_alive() {
            return false;
        }
        self.status = VectorStatus::Dead;
        self.time_of_death = Some(now);
        true
    }

    /// The "other" end of the vector from the given node.
    pub fn other_node(&self, from: NodeId) -> Option<NodeId> {
        if from == self.origin { Some(self.destination) }
        else if from == self.destination { Some(self.origin) }
        else { None }
    }
}

impl std::fmt::Display for Vector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Vector-{}-{}", self.origin.short(), self.destination.short())
    }
}
