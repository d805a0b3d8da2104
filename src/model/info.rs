//! Info: a content payload authored by exactly one node.

use serde::{Deserialize, Serialize};
use super::{entity_id, NodeId, Timestamp};
use crate::{Error, Result};

entity_id!(
    /// Opaque info identifier.
    InfoId
);

/// Selects info by variant rather than by instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InfoFilter {
    Any,
    Type(String),
}

impl InfoFilter {
    pub fn matches(&self, info: &Info) -> bool {
        match self {
            InfoFilter::Any => true,
            InfoFilter::Type(name) => info.info_type == *name,
        }
    }
}

/// Content authored by a node.
///
/// `contents` is write-once: the first assignment of a value succeeds and
/// every later assignment fails, including one with the same value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Info {
    pub id: InfoId,
    pub info_type: String,
    pub origin: NodeId,
    pub creation_time: Timestamp,
    contents: Option<String>,
}

impl Info {
    pub fn new(origin: NodeId, creation_time: Timestamp) -> Self {
        Self {
            id: InfoId::new(),
            info_type: "base".into(),
            origin,
            creation_time,
            contents: None,
        }
    }

    pub fn with_type(mut self, info_type: impl Into<String>) -> Self {
        self.info_type = info_type.into();
        self
    }

    pub fn contents(&self) -> Option<&str> {
        self.contents.as_deref()
    }

    pub fn has_contents(&self) -> bool {
        self.contents.is_some()
    }

    pub fn set_contents(&mut self, contents: impl Into<String>) -> Result<()> {
        if self.contents.is_some() {
            return Err(Error::WriteOnceViolation { info: self.id });
        }
        self.contents = Some(contents.into());
        Ok(())
    }
}

impl std::fmt::Display for Info {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Info-{}-{}", self.id.short(), self.info_type)
    }
}
