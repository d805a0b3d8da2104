//! Node lifecycle, wiring, graph queries and delivery.

use hashbrown::HashSet;
use tracing::debug;

use crate::behavior::NodeBehavior;
use crate::model::*;
use crate::storage::{
    GraphStore, InfoQuery, TransformationQuery, TransmissionQuery, VectorQuery,
};
use crate::Result;

/// Which end of a vector a query starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Outgoing,
    Incoming,
}

impl Node {
    // ========================================================================
    // Creation & lifecycle
    // ========================================================================

    /// Create and persist a free-standing node.
    pub async fn create<S: GraphStore>(store: &S, tx: &mut S::Tx, kind: NodeKind) -> Result<Node> {
        Node::new(kind, store.now()).insert(store, tx).await
    }

    /// Persist a node built with [`Node::new`] and its `with_*` helpers.
    pub async fn insert<S: GraphStore>(self, store: &S, tx: &mut S::Tx) -> Result<Node> {
        store.insert_node(tx, self.clone()).await?;
        Ok(self)
    }

    /// Mark the node dead. A second kill is a no-op.
    ///
    /// The stored row decides: `self` is refreshed from it, so a stale
    /// copy never rewinds the recorded time of death.
    pub async fn kill<S: GraphStore>(&mut self, store: &S, tx: &mut S::Tx) -> Result<()> {
        self.terminate(store, tx, NodeStatus::Dead).await
    }

    /// Mark the node failed. A second fail is a no-op.
    pub async fn fail<S: GraphStore>(&mut self, store: &S, tx: &mut S::Tx) -> Result<()> {
        self.terminate(store, tx, NodeStatus::Failed).await
    }

    async fn terminate<S: GraphStore>(
        &mut self,
        store: &S,
        tx: &mut S::Tx,
        target: NodeStatus,
    ) -> Result<()> {
        let mut stored = store.require_node(tx, self.id).await?;
        if stored.transition(target, store.now())? {
            store.update_node(tx, stored.clone()).await?;
        }
        *self = stored;
        Ok(())
    }

    // ========================================================================
    // Wiring
    // ========================================================================

    /// Create a vector from this node to `other`.
    pub async fn connect_to<S: GraphStore>(
        &self,
        store: &S,
        tx: &mut S::Tx,
        other: &Node,
    ) -> Result<Vector> {
        let vector = Vector::new(self.id, other.id, store.now());
        store.insert_vector(tx, vector.clone()).await?;
        Ok(vector)
    }

    /// Create a vector from `other` to this node.
    pub async fn connect_from<S: GraphStore>(
        &self,
        store: &S,
        tx: &mut S::Tx,
        other: &Node,
    ) -> Result<Vector> {
        other.connect_to(store, tx, self).await
    }

    // ========================================================================
    // Degree & neighbourhood (always derived from the vector table)
    // ========================================================================

    /// Number of vectors leaving this node, dead ones included.
    pub async fn outdegree<S: GraphStore>(&self, store: &S, tx: &mut S::Tx) -> Result<usize> {
        store.count_vectors(tx, &VectorQuery::from(self.id)).await
    }

    /// Number of vectors entering this node, dead ones included.
    pub async fn indegree<S: GraphStore>(&self, store: &S, tx: &mut S::Tx) -> Result<usize> {
        store.count_vectors(tx, &VectorQuery::to(self.id)).await
    }

    pub async fn outgoing_vectors<S: GraphStore>(&self, store: &S, tx: &mut S::Tx) -> Result<Vec<Vector>> {
        store.vectors(tx, &VectorQuery::from(self.id)).await
    }

    pub async fn incoming_vectors<S: GraphStore>(&self, store: &S, tx: &mut S::Tx) -> Result<Vec<Vector>> {
        store.vectors(tx, &VectorQuery::to(self.id)).await
    }

    /// Nodes this node has a vector to (any status), matching `filter`,
    /// each listed once, in order of the first vector's creation.
    pub async fn successors<S: GraphStore>(
        &self,
        store: &S,
        tx: &mut S::Tx,
        filter: &NodeFilter,
    ) -> Result<Vec<Node>> {
        self.neighbours(store, tx, Side::Outgoing, filter, false).await
    }

    /// Nodes with a vector to this node (any status), matching `filter`.
    pub async fn predecessors<S: GraphStore>(
        &self,
        store: &S,
        tx: &mut S::Tx,
        filter: &NodeFilter,
    ) -> Result<Vec<Node>> {
        self.neighbours(store, tx, Side::Incoming, filter, false).await
    }

    /// Successors reachable over alive vectors only.
    pub(crate) async fn live_successors<S: GraphStore>(
        &self,
        store: &S,
        tx: &mut S::Tx,
        filter: &NodeFilter,
    ) -> Result<Vec<Node>> {
        self.neighbours(store, tx, Side::Outgoing, filter, true).await
    }

    async fn neighbours<S: GraphStore>(
        &self,
        store: &S,
        tx: &mut S::Tx,
        side: Side,
        filter: &NodeFilter,
        alive_only: bool,
    ) -> Result<Vec<Node>> {
        let mut query = match side {
            Side::Outgoing => VectorQuery::from(self.id),
            Side::Incoming => VectorQuery::to(self.id),
        };
        if alive_only {
            query = query.alive();
        }

        let mut seen = HashSet::new();
        let mut result = Vec::new();
        for vector in store.vectors(tx, &query).await? {
            let id = match side {
                Side::Outgoing => vector.destination,
                Side::Incoming => vector.origin,
            };
            if !seen.insert(id) {
                continue;
            }
            let node = store.require_node(tx, id).await?;
            if filter.matches(&node) {
                result.push(node);
            }
        }
        Ok(result)
    }

    /// Whether any vector (alive or dead) runs from this node to `other`.
    pub async fn has_connection_to<S: GraphStore>(
        &self,
        store: &S,
        tx: &mut S::Tx,
        other: &Node,
    ) -> Result<bool> {
        let n = store.count_vectors(tx, &VectorQuery::between(self.id, other.id)).await?;
        Ok(n > 0)
    }

    /// Whether any vector (alive or dead) runs from `other` to this node.
    pub async fn has_connection_from<S: GraphStore>(
        &self,
        store: &S,
        tx: &mut S::Tx,
        other: &Node,
    ) -> Result<bool> {
        other.has_connection_to(store, tx, self).await
    }

    /// Whether an alive vector runs from this node to `other`.
    pub async fn has_live_connection_to<S: GraphStore>(
        &self,
        store: &S,
        tx: &mut S::Tx,
        other: &Node,
    ) -> Result<bool> {
        let query = VectorQuery::between(self.id, other.id).alive();
        Ok(store.count_vectors(tx, &query).await? > 0)
    }

    // ========================================================================
    // Authored content & provenance
    // ========================================================================

    /// Info this node authored, oldest first.
    pub async fn infos<S: GraphStore>(
        &self,
        store: &S,
        tx: &mut S::Tx,
        filter: &InfoFilter,
    ) -> Result<Vec<Info>> {
        let mut infos = store.infos(tx, &InfoQuery::by_origin(self.id)).await?;
        infos.retain(|i| filter.matches(i));
        Ok(infos)
    }

    /// Transformations this node performed.
    pub async fn transformations<S: GraphStore>(
        &self,
        store: &S,
        tx: &mut S::Tx,
    ) -> Result<Vec<Transformation>> {
        let query = TransformationQuery { node: Some(self.id), ..Default::default() };
        store.transformations(tx, &query).await
    }

    /// Derive a copy of `info_in` authored by this node and record the
    /// replication as a transformation.
    pub async fn replicate<S: GraphStore>(
        &self,
        store: &S,
        tx: &mut S::Tx,
        info_in: &Info,
    ) -> Result<(Info, Transformation)> {
        let mut info_out = Info::new(self.id, store.now()).with_type(info_in.info_type.clone());
        if let Some(contents) = info_in.contents() {
            info_out.set_contents(contents)?;
        }
        let info_out = info_out.insert(store, tx).await?;

        let transformation =
            Transformation::record(store, tx, self, info_in, &info_out, "replication").await?;
        Ok((info_out, transformation))
    }

    // ========================================================================
    // Transmissions
    // ========================================================================

    /// Every transmission addressed to this node, by transmit time.
    pub async fn incoming_transmissions<S: GraphStore>(
        &self,
        store: &S,
        tx: &mut S::Tx,
    ) -> Result<Vec<Transmission>> {
        store.transmissions(tx, &TransmissionQuery::to(self.id)).await
    }

    /// Every transmission of info this node authored, by transmit time.
    pub async fn outgoing_transmissions<S: GraphStore>(
        &self,
        store: &S,
        tx: &mut S::Tx,
    ) -> Result<Vec<Transmission>> {
        store.transmissions(tx, &TransmissionQuery::from(self.id)).await
    }

    /// Transmissions addressed to this node that were not yet received.
    pub async fn pending_transmissions<S: GraphStore>(
        &self,
        store: &S,
        tx: &mut S::Tx,
    ) -> Result<Vec<Transmission>> {
        store.transmissions(tx, &TransmissionQuery::to(self.id).pending()).await
    }

    /// Receive every pending transmission, then hand their info to
    /// `behavior.update` in transmit order.
    ///
    /// Returns the transmissions received by this call. Already received
    /// transmissions are never delivered again.
    pub async fn receive_all<S: GraphStore>(
        &self,
        store: &S,
        tx: &mut S::Tx,
        behavior: &dyn NodeBehavior<S>,
    ) -> Result<Vec<Transmission>> {
        let mut pending = self.pending_transmissions(store, tx).await?;
        let mut infos = Vec::with_capacity(pending.len());
        for transmission in &mut pending {
            transmission.mark_received(store.now());
            store.update_transmission(tx, transmission.clone()).await?;
            infos.push(store.require_info(tx, transmission.info).await?);
        }

        debug!(node = %self, received = pending.len(), "receive_all");
        behavior.update(store, tx, self, infos).await?;
        Ok(pending)
    }
}
