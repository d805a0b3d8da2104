//! Node behavior capability.
//!
//! A [`Node`] row holds only the common fields. Whatever a concrete variant
//! *does* (what it sends by default, to whom, how it reacts to what it
//! receives, how a source invents content) lives behind [`NodeBehavior`],
//! which callers hand to `transmit` and `receive_all`.

use async_trait::async_trait;

use crate::model::{Info, InfoFilter, Node, NodeFilter};
use crate::ops::{ToWhom, What};
use crate::storage::GraphStore;
use crate::{Error, Result};

/// Behavior hooks of a node variant.
///
/// `what` and `to_whom` have working defaults; `update` and
/// `create_information` must be overridden by any variant that is asked
/// to receive or to originate content.
#[async_trait]
pub trait NodeBehavior<S: GraphStore>: Send + Sync {
    /// Content to send when `transmit` is called without any.
    ///
    /// Default: every info this node authored.
    async fn what(&self, _store: &S, _tx: &mut S::Tx, _node: &Node) -> Result<Option<What>> {
        Ok(Some(What::Type(InfoFilter::Any)))
    }

    /// Recipients when `transmit` is called without any.
    ///
    /// Default: every directly connected successor.
    async fn to_whom(&self, _store: &S, _tx: &mut S::Tx, _node: &Node) -> Result<Option<ToWhom>> {
        Ok(Some(ToWhom::Type(NodeFilter::Any)))
    }

    /// React to newly received content, in transmit order.
    async fn update(&self, _store: &S, _tx: &mut S::Tx, node: &Node, _infos: Vec<Info>) -> Result<()> {
        Err(Error::NotImplemented(format!(
            "the update method of {node} has not been overridden"
        )))
    }

    /// Generate new information authored by `node`.
    async fn create_information(&self, _store: &S, _tx: &mut S::Tx, node: &Node) -> Result<Info> {
        Err(Error::NotImplemented(format!(
            "create_information of {node} has not been overridden"
        )))
    }
}

/// Agent that adopts everything it receives by replicating it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplicatorAgent;

#[async_trait]
impl<S: GraphStore> NodeBehavior<S> for ReplicatorAgent {
    async fn update(&self, store: &S, tx: &mut S::Tx, node: &Node, infos: Vec<Info>) -> Result<()> {
        for info in &infos {
            node.replicate(store, tx, info).await?;
        }
        Ok(())
    }
}

/// Source that always emits the same contents, as a fresh info each time.
#[derive(Debug, Clone)]
pub struct ConstantSource {
    pub contents: String,
    pub info_type: String,
}

impl ConstantSource {
    pub fn new(contents: impl Into<String>) -> Self {
        Self { contents: contents.into(), info_type: "base".into() }
    }

    pub fn with_type(mut self, info_type: impl Into<String>) -> Self {
        self.info_type = info_type.into();
        self
    }
}

#[async_trait]
impl<S: GraphStore> NodeBehavior<S> for ConstantSource {
    /// Sources send new information rather than their back catalogue.
    async fn what(&self, store: &S, tx: &mut S::Tx, node: &Node) -> Result<Option<What>> {
        let info = self.create_information(store, tx, node).await?;
        Ok(Some(What::Info(info)))
    }

    async fn create_information(&self, store: &S, tx: &mut S::Tx, node: &Node) -> Result<Info> {
        let mut info = Info::new(node.id, store.now()).with_type(self.info_type.clone());
        info.set_contents(self.contents.clone())?;
        info.insert(store, tx).await
    }
}
