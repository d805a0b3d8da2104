//! Transformation: provenance of derived info.

use serde::{Deserialize, Serialize};
use super::{entity_id, InfoId, NodeId, Timestamp};

entity_id!(
    /// Opaque transformation identifier.
    TransformationId
);

/// Directed edge `info_in → info_out` in the info-to-info provenance graph,
/// attributed to the node that performed the derivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transformation {
    pub id: TransformationId,
    pub transformation_type: String,
    pub node: NodeId,
    pub info_in: InfoId,
    pub info_out: InfoId,
    pub transform_time: Timestamp,
}

impl Transformation {
    pub fn new(node: NodeId, info_in: InfoId, info_out: InfoId, transform_time: Timestamp) -> Self {
        Self {
            id: TransformationId::new(),
            transformation_type: "base".into(),
            node,
            info_in,
            info_out,
            transform_time,
        }
    }

    pub fn with_type(mut self, transformation_type: impl Into<String>) -> Self {
        self.transformation_type = transformation_type.into();
        self
    }
}

impl std::fmt::Display for Transformation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Transformation-{}", self.id.short())
    }
}
