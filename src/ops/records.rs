//! Store-backed operations on info, vectors, transmissions and
//! transformations.

use crate::model::*;
use crate::storage::{GraphStore, TransformationQuery, TransmissionQuery, VectorQuery};
use crate::{Error, Result};

// ============================================================================
// Info
// ============================================================================

impl Info {
    /// Create and persist a base info authored by `origin`.
    pub async fn create<S: GraphStore>(
        store: &S,
        tx: &mut S::Tx,
        origin: &Node,
        contents: impl Into<String>,
    ) -> Result<Info> {
        let mut info = Info::new(origin.id, store.now());
        info.set_contents(contents)?;
        info.insert(store, tx).await
    }

    /// Persist an info built with [`Info::new`].
    pub async fn insert<S: GraphStore>(self, store: &S, tx: &mut S::Tx) -> Result<Info> {
        store.insert_info(tx, self.clone()).await?;
        Ok(self)
    }

    /// Set the contents of a stored info that has none yet. Checked
    /// against the stored row, not this copy.
    pub async fn write_contents<S: GraphStore>(
        &mut self,
        store: &S,
        tx: &mut S::Tx,
        contents: impl Into<String>,
    ) -> Result<()> {
        let mut stored = store.require_info(tx, self.id).await?;
        stored.set_contents(contents)?;
        store.update_info(tx, stored.clone()).await?;
        *self = stored;
        Ok(())
    }

    pub async fn transmissions<S: GraphStore>(
        &self,
        store: &S,
        tx: &mut S::Tx,
    ) -> Result<Vec<Transmission>> {
        store.transmissions(tx, &TransmissionQuery::of_info(self.id)).await
    }

    /// Transformations that took this info as input.
    pub async fn transformations_applied_to<S: GraphStore>(
        &self,
        store: &S,
        tx: &mut S::Tx,
    ) -> Result<Vec<Transformation>> {
        let query = TransformationQuery { info_in: Some(self.id), ..Default::default() };
        store.transformations(tx, &query).await
    }

    /// Transformations that produced this info.
    pub async fn transformation_whence<S: GraphStore>(
        &self,
        store: &S,
        tx: &mut S::Tx,
    ) -> Result<Vec<Transformation>> {
        let query = TransformationQuery { info_out: Some(self.id), ..Default::default() };
        store.transformations(tx, &query).await
    }
}

// ============================================================================
// Vector
// ============================================================================

impl Vector {
    /// Mark the vector dead. Killing a dead vector changes nothing, and
    /// `self` is refreshed from the stored row either way.
    pub async fn kill<S: GraphStore>(&mut self, store: &S, tx: &mut S::Tx) -> Result<()> {
        let mut stored = store.require_vector(tx, self.id).await?;
        if stored.mark_dead(store.now()) {
            store.update_vector(tx, stored.clone()).await?;
        }
        *self = stored;
        Ok(())
    }

    /// Network of the origin node.
    pub async fn network<S: GraphStore>(&self, store: &S, tx: &mut S::Tx) -> Result<Option<NetworkId>> {
        Ok(store.require_node(tx, self.origin).await?.network)
    }

    /// Transmissions whose implied edge is (origin, destination), by
    /// transmit time. Parallel vectors share the same transmissions.
    pub async fn transmissions<S: GraphStore>(
        &self,
        store: &S,
        tx: &mut S::Tx,
    ) -> Result<Vec<Transmission>> {
        let query = TransmissionQuery {
            origin: Some(self.origin),
            destination: Some(self.destination),
            ..Default::default()
        };
        store.transmissions(tx, &query).await
    }
}

// ============================================================================
// Transmission
// ============================================================================

impl Transmission {
    /// Stamp the receive time and persist it.
    pub async fn receive<S: GraphStore>(&mut self, store: &S, tx: &mut S::Tx) -> Result<()> {
        self.mark_received(store.now());
        store.update_transmission(tx, self.clone()).await
    }

    /// Origin node, derived through the transmitted info.
    pub async fn origin<S: GraphStore>(&self, store: &S, tx: &mut S::Tx) -> Result<NodeId> {
        Ok(store.require_info(tx, self.info).await?.origin)
    }

    /// The implied vector (info origin → destination), preferring an
    /// alive one when parallel vectors exist.
    pub async fn vector<S: GraphStore>(&self, store: &S, tx: &mut S::Tx) -> Result<Vector> {
        let origin = self.origin(store, tx).await?;
        let mut vectors = store.vectors(tx, &VectorQuery::between(origin, self.destination)).await?;
        match vectors.iter().position(Vector::is_alive) {
            Some(i) => Ok(vectors.swap_remove(i)),
            None => vectors.into_iter().next()
                .ok_or_else(|| Error::NotFound(format!("Vector {origin} -> {}", self.destination))),
        }
    }
}

// ============================================================================
// Transformation
// ============================================================================

impl Transformation {
    /// Record that `node` derived `info_out` from `info_in`.
    pub async fn record<S: GraphStore>(
        store: &S,
        tx: &mut S::Tx,
        node: &Node,
        info_in: &Info,
        info_out: &Info,
        transformation_type: &str,
    ) -> Result<Transformation> {
        let transformation = Transformation::new(node.id, info_in.id, info_out.id, store.now())
            .with_type(transformation_type);
        store.insert_transformation(tx, transformation.clone()).await?;
        Ok(transformation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::storage::memory::MemoryTx;
    use crate::tx::{Isolation, TxMode};

    async fn setup() -> (MemoryStore, MemoryTx) {
        let db = MemoryStore::new();
        let tx = db.begin_tx(TxMode::ReadWrite, Isolation::ReadCommitted).await.unwrap();
        (db, tx)
    }

    #[tokio::test]
    async fn test_write_contents_once() {
        let (db, mut tx) = setup().await;
        let node = Node::create(&db, &mut tx, NodeKind::source()).await.unwrap();
        let mut info = Info::new(node.id, db.now()).insert(&db, &mut tx).await.unwrap();

        info.write_contents(&db, &mut tx, "hello").await.unwrap();
        let err = info.write_contents(&db, &mut tx, "hello").await.unwrap_err();
        assert!(matches!(err, Error::WriteOnceViolation { .. }));

        let stored = db.require_info(&mut tx, info.id).await.unwrap();
        assert_eq!(stored.contents(), Some("hello"));
    }

    #[tokio::test]
    async fn test_write_contents_through_stale_copy() {
        let (db, mut tx) = setup().await;
        let node = Node::create(&db, &mut tx, NodeKind::source()).await.unwrap();
        let mut info = Info::new(node.id, db.now()).insert(&db, &mut tx).await.unwrap();
        let mut stale = info.clone();

        info.write_contents(&db, &mut tx, "first").await.unwrap();
        let err = stale.write_contents(&db, &mut tx, "first").await.unwrap_err();
        assert!(matches!(err, Error::WriteOnceViolation { .. }));
        let err = stale.write_contents(&db, &mut tx, "second").await.unwrap_err();
        assert!(matches!(err, Error::WriteOnceViolation { .. }));

        assert!(!stale.has_contents());
        assert_eq!(db.require_info(&mut tx, info.id).await.unwrap().contents(), Some("first"));
    }

    #[tokio::test]
    async fn test_kill_vector_through_stale_copy() {
        let (db, mut tx) = setup().await;
        let a = Node::create(&db, &mut tx, NodeKind::agent()).await.unwrap();
        let b = Node::create(&db, &mut tx, NodeKind::agent()).await.unwrap();
        let mut vector = a.connect_to(&db, &mut tx, &b).await.unwrap();
        let mut stale = vector.clone();

        vector.kill(&db, &mut tx).await.unwrap();
        let died = vector.time_of_death.clone();
        assert!(died.is_some());

        stale.kill(&db, &mut tx).await.unwrap();
        assert_eq!(stale.time_of_death, died);
        assert_eq!(db.require_vector(&mut tx, vector.id).await.unwrap().time_of_death, died);
    }

    #[tokio::test]
    async fn test_transmission_vector_and_origin() {
        let (db, mut tx) = setup().await;
        let a = Node::create(&db, &mut tx, NodeKind::agent()).await.unwrap();
        let b = Node::create(&db, &mut tx, NodeKind::agent()).await.unwrap();
        let mut dead = a.connect_to(&db, &mut tx, &b).await.unwrap();
        dead.kill(&db, &mut tx).await.unwrap();
        let live = a.connect_to(&db, &mut tx, &b).await.unwrap();

        let info = Info::create(&db, &mut tx, &a, "x").await.unwrap();
        let mut t = Transmission::new(info.id, b.id, db.now());
        db.insert_transmission(&mut tx, t.clone()).await.unwrap();

        assert_eq!(t.origin(&db, &mut tx).await.unwrap(), a.id);
        assert_eq!(t.vector(&db, &mut tx).await.unwrap().id, live.id);
        assert_eq!(live.transmissions(&db, &mut tx).await.unwrap(), vec![t.clone()]);
        assert_eq!(dead.transmissions(&db, &mut tx).await.unwrap().len(), 1);

        t.receive(&db, &mut tx).await.unwrap();
        assert!(b.pending_transmissions(&db, &mut tx).await.unwrap().is_empty());
        assert_eq!(info.transmissions(&db, &mut tx).await.unwrap()[0].receive_time, t.receive_time);
    }

    #[tokio::test]
    async fn test_transformation_links_both_ways() {
        let (db, mut tx) = setup().await;
        let node = Node::create(&db, &mut tx, NodeKind::agent()).await.unwrap();
        let a = Info::create(&db, &mut tx, &node, "a").await.unwrap();
        let b = Info::create(&db, &mut tx, &node, "b").await.unwrap();
        let t = Transformation::record(&db, &mut tx, &node, &a, &b, "mutation").await.unwrap();

        assert_eq!(a.transformations_applied_to(&db, &mut tx).await.unwrap(), vec![t.clone()]);
        assert_eq!(b.transformation_whence(&db, &mut tx).await.unwrap(), vec![t]);
        assert!(a.transformation_whence(&db, &mut tx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_vector_network_follows_origin() {
        let (db, mut tx) = setup().await;
        let net = Network::create(&db, &mut tx, NetworkKind::Base).await.unwrap();
        let a = Node::new(NodeKind::agent(), db.now()).with_network(net.id).insert(&db, &mut tx).await.unwrap();
        let b = Node::create(&db, &mut tx, NodeKind::agent()).await.unwrap();

        let v = a.connect_to(&db, &mut tx, &b).await.unwrap();
        let w = b.connect_to(&db, &mut tx, &a).await.unwrap();
        assert_eq!(v.network(&db, &mut tx).await.unwrap(), Some(net.id));
        assert_eq!(w.network(&db, &mut tx).await.unwrap(), None);
    }
}
