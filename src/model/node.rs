//! Node in the experiment graph.

use serde::{Deserialize, Serialize};
use super::{entity_id, NetworkId, Timestamp};
use crate::{Error, Result};

entity_id!(
    /// Opaque node identifier.
    NodeId
);

/// Which part a node plays in a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    /// Plain node with no network role.
    Base,
    /// Originates information.
    Source,
    /// Receives, transforms and forwards information.
    Agent,
}

/// Polymorphic identity of a node: its role plus a free-form type tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeKind {
    pub role: NodeRole,
    pub type_name: String,
}

impl NodeKind {
    pub fn new(role: NodeRole, type_name: impl Into<String>) -> Self {
        Self { role, type_name: type_name.into() }
    }

    pub fn base() -> Self {
        Self::new(NodeRole::Base, "base")
    }

    pub fn source() -> Self {
        Self::new(NodeRole::Source, "generic_source")
    }

    pub fn agent() -> Self {
        Self::new(NodeRole::Agent, "agent")
    }
}

/// Lifecycle status. `Dead` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Alive,
    Dead,
    Failed,
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            NodeStatus::Alive => "alive",
            NodeStatus::Dead => "dead",
            NodeStatus::Failed => "failed",
        })
    }
}

/// Selects nodes by variant rather than by instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeFilter {
    /// Every node.
    Any,
    /// Nodes playing the given role, whatever their type tag.
    Role(NodeRole),
    /// Nodes with exactly this type tag.
    Type(String),
}

impl NodeFilter {
    pub fn matches(&self, node: &Node) -> bool {
        match self {
            NodeFilter::Any => true,
            NodeFilter::Role(role) => node.kind.role == *role,
            NodeFilter::Type(name) => node.kind.type_name == *name,
        }
    }
}

/// A participant in the experiment graph.
///
/// Degree, successors and predecessors are never stored here; they are
/// derived from the vector table on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub creation_time: Timestamp,
    pub status: NodeStatus,
    /// Set once, on the first transition out of `Alive`.
    pub time_of_death: Option<Timestamp>,
    pub network: Option<NetworkId>,
    /// Opaque external participant id.
    pub participant: Option<String>,
}

impl Node {
    pub fn new(kind: NodeKind, creation_time: Timestamp) -> Self {
        Self {
            id: NodeId::new(),
            kind,
            creation_time,
            status: NodeStatus::Alive,
            time_of_death: None,
            network: None,
            participant: None,
        }
    }

    pub fn with_network(mut self, network: NetworkId) -> Self {
        self.network = Some(network);
        self
    }

    pub fn with_participant(mut self, participant: impl Into<String>) -> Self {
        self.participant = Some(participant.into());
        self
    }

    pub fn role(&self) -> NodeRole {
        self.kind.role
    }

    pub fn is_alive(&self) -> bool {
        self.status == NodeStatus::Alive
    }

    /// Move to a terminal status.
    ///
    /// Returns `Ok(false)` when the node is already in `target` (nothing
    /// changes), and `InvalidState` when it already reached the other
    /// terminal status.
    pub fn transition(&mut self, target: NodeStatus, now: Timestamp) -> Result<bool> {
        if target == NodeStatus::Alive {
            return Err(Error::InvalidState(format!("{self} cannot be revived")));
        }
        match self.status {
            NodeStatus::Alive => {
                self.status = target;
                self.time_of_death = Some(now);
                Ok(true)
            }
            current if current == target => Ok(false),
            current => Err(Error::InvalidState(format!(
                "{self} is already {current}, cannot become {target}"
            ))),
        }
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Node-{}-{}", self.id.short(), self.kind.type_name)
    }
}
