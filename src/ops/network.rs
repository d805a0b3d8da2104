//! Network membership queries and wiring policies.

use serde::{Deserialize, Serialize};

use crate::model::*;
use crate::storage::{GraphStore, NodeQuery, VectorQuery};
use crate::{Error, Result};

/// Headline counts of a network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSummary {
    pub id: NetworkId,
    pub kind: NetworkKind,
    pub agents: usize,
    pub sources: usize,
    pub vectors: usize,
}

impl std::fmt::Display for NetworkSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<Network-{}-{} with {} agents, {} sources, {} vectors>",
            self.id.short(), self.kind, self.agents, self.sources, self.vectors,
        )
    }
}

impl Network {
    /// Create and persist an empty network.
    pub async fn create<S: GraphStore>(store: &S, tx: &mut S::Tx, kind: NetworkKind) -> Result<Network> {
        let network = Network::new(kind, store.now());
        store.insert_network(tx, network.clone()).await?;
        Ok(network)
    }

    // ========================================================================
    // Membership
    // ========================================================================

    /// Member agents that are neither dead nor failed, oldest first.
    pub async fn agents<S: GraphStore>(&self, store: &S, tx: &mut S::Tx) -> Result<Vec<Node>> {
        let query = NodeQuery::in_network(self.id)
            .role(NodeRole::Agent)
            .excluding(NodeStatus::Failed)
            .excluding(NodeStatus::Dead);
        store.nodes(tx, &query).await
    }

    /// Member sources that have not failed, oldest first.
    pub async fn sources<S: GraphStore>(&self, store: &S, tx: &mut S::Tx) -> Result<Vec<Node>> {
        let query = NodeQuery::in_network(self.id)
            .role(NodeRole::Source)
            .excluding(NodeStatus::Failed);
        store.nodes(tx, &query).await
    }

    /// Sources followed by agents.
    pub async fn nodes<S: GraphStore>(&self, store: &S, tx: &mut S::Tx) -> Result<Vec<Node>> {
        let mut nodes = self.sources(store, tx).await?;
        nodes.extend(self.agents(store, tx).await?);
        Ok(nodes)
    }

    /// Every vector whose origin is a member, ordered by (origin, destination).
    pub async fn vectors<S: GraphStore>(&self, store: &S, tx: &mut S::Tx) -> Result<Vec<Vector>> {
        let mut vectors = store.vectors(tx, &VectorQuery::in_network(self.id)).await?;
        // Stable sort keeps creation order among parallel vectors.
        vectors.sort_by_key(|v| (v.origin, v.destination));
        Ok(vectors)
    }

    /// Outdegree of each agent, in agent order.
    pub async fn get_degrees<S: GraphStore>(&self, store: &S, tx: &mut S::Tx) -> Result<Vec<usize>> {
        let mut degrees = Vec::new();
        for agent in self.agents(store, tx).await? {
            degrees.push(agent.outdegree(store, tx).await?);
        }
        Ok(degrees)
    }

    /// Whether any member, in any status, carries this participant id.
    pub async fn has_participant<S: GraphStore>(
        &self,
        store: &S,
        tx: &mut S::Tx,
        participant: &str,
    ) -> Result<bool> {
        let query = NodeQuery::in_network(self.id).participant(participant);
        Ok(!store.nodes(tx, &query).await?.is_empty())
    }

    /// Always fails: a network has no single "size". Ask for
    /// `agents()`, `sources()` or `vectors()` and count those.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> Result<usize> {
        Err(Error::Conceptual(
            "len is not defined for networks; count agents(), sources() or vectors() instead".into(),
        ))
    }

    pub async fn summary<S: GraphStore>(&self, store: &S, tx: &mut S::Tx) -> Result<NetworkSummary> {
        Ok(NetworkSummary {
            id: self.id,
            kind: self.kind,
            agents: self.agents(store, tx).await?.len(),
            sources: self.sources(store, tx).await?.len(),
            vectors: self.vectors(store, tx).await?.len(),
        })
    }

    // ========================================================================
    // Wiring
    // ========================================================================

    async fn adopt<S: GraphStore>(
        &self,
        store: &S,
        tx: &mut S::Tx,
        node: &mut Node,
        role: NodeRole,
    ) -> Result<()> {
        if node.role() != role {
            return Err(Error::InvalidState(format!(
                "{node} cannot join network {} as {role:?}", self.id
            )));
        }
        let mut joined = store.require_node(tx, node.id).await?;
        joined.network = Some(self.id);
        store.update_node(tx, joined.clone()).await?;
        *node = joined;
        Ok(())
    }

    /// Make `source` a member without wiring it.
    pub async fn add_source<S: GraphStore>(
        &self,
        store: &S,
        tx: &mut S::Tx,
        source: &mut Node,
    ) -> Result<()> {
        self.adopt(store, tx, source, NodeRole::Source).await
    }

    /// Make `source` a member and connect it to every current agent.
    pub async fn add_source_global<S: GraphStore>(
        &self,
        store: &S,
        tx: &mut S::Tx,
        source: &mut Node,
    ) -> Result<Vec<Vector>> {
        self.adopt(store, tx, source, NodeRole::Source).await?;
        let mut vectors = Vec::new();
        for agent in self.agents(store, tx).await? {
            vectors.push(source.connect_to(store, tx, &agent).await?);
        }
        Ok(vectors)
    }

    /// Make `source` a member and connect it to `agent` only.
    pub async fn add_source_local<S: GraphStore>(
        &self,
        store: &S,
        tx: &mut S::Tx,
        source: &mut Node,
        agent: &Node,
    ) -> Result<Vec<Vector>> {
        self.adopt(store, tx, source, NodeRole::Source).await?;
        Ok(vec![source.connect_to(store, tx, agent).await?])
    }

    /// Make `agent` a member and wire it according to the network kind.
    ///
    /// Returns the vectors created; `Base` networks create none.
    pub async fn add_agent<S: GraphStore>(
        &self,
        store: &S,
        tx: &mut S::Tx,
        agent: &mut Node,
    ) -> Result<Vec<Vector>> {
        let existing = self.agents(store, tx).await?;
        self.adopt(store, tx, agent, NodeRole::Agent).await?;

        let mut vectors = Vec::new();
        match self.kind {
            NetworkKind::Base => {}
            NetworkKind::Chain => {
                if let Some(previous) = existing.last() {
                    vectors.push(previous.connect_to(store, tx, agent).await?);
                }
            }
            NetworkKind::FullyConnected => {
                for other in &existing {
                    vectors.push(other.connect_to(store, tx, agent).await?);
                    vectors.push(agent.connect_to(store, tx, other).await?);
                }
            }
            NetworkKind::Star => {
                if let Some(hub) = existing.first() {
                    vectors.push(hub.connect_to(store, tx, agent).await?);
                    vectors.push(agent.connect_to(store, tx, hub).await?);
                }
            }
        }
        Ok(vectors)
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
    async fn test_len_is_conceptual_error() {
        let (db, mut tx) = setup().await;
        let net = Network::create(&db, &mut tx, NetworkKind::Base).await.unwrap();
        assert!(matches!(net.len(), Err(Error::Conceptual(_))));
    }

    #[tokio::test]
    async fn test_rejected_join_leaves_node_untouched() {
        let db = MemoryStore::new();
        let mut setup = db.begin_tx(TxMode::ReadWrite, Isolation::ReadCommitted).await.unwrap();
        let net = Network::create(&db, &mut setup, NetworkKind::Base).await.unwrap();
        let mut agent = Node::create(&db, &mut setup, NodeKind::agent()).await.unwrap();
        db.commit_tx(setup).await.unwrap();

        let mut read_only = db.begin_tx(TxMode::ReadOnly, Isolation::ReadCommitted).await.unwrap();
        let err = net.add_agent(&db, &mut read_only, &mut agent).await.unwrap_err();
        assert!(matches!(err, Error::TxError(_)));
        assert_eq!(agent.network, None);
    }

    #[tokio::test]
    async fn test_wrong_role_is_rejected() {
        let (db, mut tx) = setup().await;
        let net = Network::create(&db, &mut tx, NetworkKind::Base).await.unwrap();
        let mut source = Node::create(&db, &mut tx, NodeKind::source()).await.unwrap();
        let err = net.add_agent(&db, &mut tx, &mut source).await.unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
        assert_eq!(source.network, None);
    }

    #[tokio::test]
    async fn test_summary_display() {
        let (db, mut tx) = setup().await;
        let net = Network::create(&db, &mut tx, NetworkKind::Chain).await.unwrap();
        for _ in 0..3 {
            let mut agent = Node::create(&db, &mut tx, NodeKind::agent()).await.unwrap();
            net.add_agent(&db, &mut tx, &mut agent).await.unwrap();
        }
        let summary = net.summary(&db, &mut tx).await.unwrap();
        assert_eq!((summary.agents, summary.sources, summary.vectors), (3, 0, 2));
        assert_eq!(
            summary.to_string(),
            format!("<Network-{}-chain with 3 agents, 0 sources, 2 vectors>", net.id.short()),
        );
    }
}
