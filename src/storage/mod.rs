//! # Graph Store Trait
//!
//! This is THE contract between the graph operations and any persistence
//! engine. The operations never hold entities by pointer: every successor,
//! degree and membership question is answered by an indexed query here.
//!
//! ## Implementations
//!
//! | Backend | Module | Description |
//! |---------|--------|-------------|
//! | `MemoryStore` | `memory` | In-memory snapshot store for testing/embedding |

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::model::*;
use crate::tx::{Isolation, Transaction, TxMode};
use crate::{Error, Result};

pub use memory::MemoryStore;

// ============================================================================
// Backend Configuration
// ============================================================================

/// Which store to open.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// In-memory (no persistence)
    #[default]
    Memory,
}

// ============================================================================
// Queries
// ============================================================================

/// Sort direction on the query's natural time column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    #[default]
    Ascending,
    Descending,
}

/// Nodes matching every set field, ordered by creation time ascending.
#[derive(Debug, Clone, Default)]
pub struct NodeQuery {
    pub network: Option<NetworkId>,
    pub role: Option<NodeRole>,
    pub participant: Option<String>,
    pub exclude_status: SmallVec<[NodeStatus; 2]>,
}

impl NodeQuery {
    pub fn in_network(network: NetworkId) -> Self {
        Self { network: Some(network), ..Self::default() }
    }

    pub fn role(mut self, role: NodeRole) -> Self {
        self.role = Some(role);
        self
    }

    pub fn participant(mut self, participant: impl Into<String>) -> Self {
        self.participant = Some(participant.into());
        self
    }

    pub fn excluding(mut self, status: NodeStatus) -> Self {
        self.exclude_status.push(status);
        self
    }

    pub fn matches(&self, node: &Node) -> bool {
        self.network.is_none_or(|n| node.network == Some(n))
            && self.role.is_none_or(|r| node.kind.role == r)
            && self.participant.as_deref().is_none_or(|p| node.participant.as_deref() == Some(p))
            && !self.exclude_status.contains(&node.status)
    }
}

/// Vectors matching every set field, ordered by creation time ascending.
///
/// `network` matches on the network of the vector's origin node.
#[derive(Debug, Clone, Default)]
pub struct VectorQuery {
    pub origin: Option<NodeId>,
    pub destination: Option<NodeId>,
    pub network: Option<NetworkId>,
    pub status: Option<VectorStatus>,
}

impl VectorQuery {
    pub fn from(origin: NodeId) -> Self {
        Self { origin: Some(origin), ..Self::default() }
    }

    pub fn to(destination: NodeId) -> Self {
        Self { destination: Some(destination), ..Self::default() }
    }

    pub fn between(origin: NodeId, destination: NodeId) -> Self {
        Self { origin: Some(origin), destination: Some(destination), ..Self::default() }
    }

    pub fn in_network(network: NetworkId) -> Self {
        Self { network: Some(network), ..Self::default() }
    }

    pub fn alive(mut self) -> Self {
        self.status = Some(VectorStatus::Alive);
        self
    }
}

/// Info matching every set field, ordered by creation time.
#[derive(Debug, Clone, Default)]
pub struct InfoQuery {
    pub origin: Option<NodeId>,
    pub order: Order,
}

impl InfoQuery {
    pub fn by_origin(origin: NodeId) -> Self {
        Self { origin: Some(origin), ..Self::default() }
    }

    pub fn newest_first(mut self) -> Self {
        self.order = Order::Descending;
        self
    }
}

/// Transmissions matching every set field, ordered by transmit time ascending.
///
/// `origin` matches on the origin of the transmitted info.
#[derive(Debug, Clone, Default)]
pub struct TransmissionQuery {
    pub info: Option<InfoId>,
    pub origin: Option<NodeId>,
    pub destination: Option<NodeId>,
    pub pending_only: bool,
}

impl TransmissionQuery {
    pub fn to(destination: NodeId) -> Self {
        Self { destination: Some(destination), ..Self::default() }
    }

    pub fn from(origin: NodeId) -> Self {
        Self { origin: Some(origin), ..Self::default() }
    }

    pub fn of_info(info: InfoId) -> Self {
        Self { info: Some(info), ..Self::default() }
    }

    pub fn pending(mut self) -> Self {
        self.pending_only = true;
        self
    }
}

/// Transformations matching every set field, ordered by transform time ascending.
#[derive(Debug, Clone, Default)]
pub struct TransformationQuery {
    pub node: Option<NodeId>,
    pub info_in: Option<InfoId>,
    pub info_out: Option<InfoId>,
}

// ============================================================================
// GraphStore Trait
// ============================================================================

/// The universal persistence contract.
///
/// Ids and timestamps are minted by the caller (timestamps from
/// [`GraphStore::now`]); the store keeps rows, answers filtered ordered
/// queries, and scopes everything to a transaction. Reads take the
/// transaction mutably so a backend can record what it read for
/// serializable conflict detection.
#[async_trait]
pub trait GraphStore: Send + Sync + 'static {
    /// The transaction type for this store.
    type Tx: Transaction;

    /// Current time from the store's clock.
    fn now(&self) -> Timestamp;

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Begin a new transaction.
    async fn begin_tx(&self, mode: TxMode, isolation: Isolation) -> Result<Self::Tx>;

    /// Commit a transaction. Serializable transactions may fail with
    /// [`Error::Conflict`], in which case nothing was applied.
    async fn commit_tx(&self, tx: Self::Tx) -> Result<()>;

    /// Roll back a transaction, discarding its writes and queued messages.
    async fn rollback_tx(&self, tx: Self::Tx) -> Result<()>;

    // ========================================================================
    // Networks
    // ========================================================================

    async fn insert_network(&self, tx: &mut Self::Tx, network: Network) -> Result<()>;

    async fn get_network(&self, tx: &mut Self::Tx, id: NetworkId) -> Result<Option<Network>>;

    // ========================================================================
    // Nodes
    // ========================================================================

    async fn insert_node(&self, tx: &mut Self::Tx, node: Node) -> Result<()>;

    /// Replace an existing node row. `NotFound` if it does not exist.
    async fn update_node(&self, tx: &mut Self::Tx, node: Node) -> Result<()>;

    async fn get_node(&self, tx: &mut Self::Tx, id: NodeId) -> Result<Option<Node>>;

    async fn nodes(&self, tx: &mut Self::Tx, query: &NodeQuery) -> Result<Vec<Node>>;

    // ========================================================================
    // Vectors
    // ========================================================================

    async fn insert_vector(&self, tx: &mut Self::Tx, vector: Vector) -> Result<()>;

    async fn update_vector(&self, tx: &mut Self::Tx, vector: Vector) -> Result<()>;

    async fn get_vector(&self, tx: &mut Self::Tx, id: VectorId) -> Result<Option<Vector>>;

    async fn vectors(&self, tx: &mut Self::Tx, query: &VectorQuery) -> Result<Vec<Vector>>;

    /// Number of vectors matching `query`.
    ///
    /// Default: materializes the query. Override for backends with counts.
    async fn count_vectors(&self, tx: &mut Self::Tx, query: &VectorQuery) -> Result<usize> {
        Ok(self.vectors(tx, query).await?.len())
    }

    // ========================================================================
    // Info
    // ========================================================================

    async fn insert_info(&self, tx: &mut Self::Tx, info: Info) -> Result<()>;

    /// Replace an existing info row.
    ///
    /// Must refuse with `WriteOnceViolation` if the stored row already has
    /// contents and the new row's contents differ.
    async fn update_info(&self, tx: &mut Self::Tx, info: Info) -> Result<()>;

    async fn get_info(&self, tx: &mut Self::Tx, id: InfoId) -> Result<Option<Info>>;

    async fn infos(&self, tx: &mut Self::Tx, query: &InfoQuery) -> Result<Vec<Info>>;

    // ========================================================================
    // Transmissions
    // ========================================================================

    async fn insert_transmission(&self, tx: &mut Self::Tx, transmission: Transmission) -> Result<()>;

    async fn update_transmission(&self, tx: &mut Self::Tx, transmission: Transmission) -> Result<()>;

    async fn get_transmission(
        &self,
        tx: &mut Self::Tx,
        id: TransmissionId,
    ) -> Result<Option<Transmission>>;

    async fn transmissions(
        &self,
        tx: &mut Self::Tx,
        query: &TransmissionQuery,
    ) -> Result<Vec<Transmission>>;

    // ========================================================================
    // Transformations
    // ========================================================================

    async fn insert_transformation(
        &self,
        tx: &mut Self::Tx,
        transformation: Transformation,
    ) -> Result<()>;

    async fn get_transformation(
        &self,
        tx: &mut Self::Tx,
        id: TransformationId,
    ) -> Result<Option<Transformation>>;

    async fn transformations(
        &self,
        tx: &mut Self::Tx,
        query: &TransformationQuery,
    ) -> Result<Vec<Transformation>>;

    // ========================================================================
    // Required lookups
    // ========================================================================

    /// Like `get_node`, but a missing row is `NotFound`.
    async fn require_node(&self, tx: &mut Self::Tx, id: NodeId) -> Result<Node> {
        self.get_node(tx, id).await?
            .ok_or_else(|| Error::NotFound(format!("Node {id}")))
    }

    /// Like `get_vector`, but a missing row is `NotFound`.
    async fn require_vector(&self, tx: &mut Self::Tx, id: VectorId) -> Result<Vector> {
        self.get_vector(tx, id).await?
            .ok_or_else(|| Error::NotFound(format!("Vector {id}")))
    }

    /// Like `get_info`, but a missing row is `NotFound`.
    async fn require_info(&self, tx: &mut Self::Tx, id: InfoId) -> Result<Info> {
        self.get_info(tx, id).await?
            .ok_or_else(|| Error::NotFound(format!("Info {id}")))
    }

    /// Like `get_network`, but a missing row is `NotFound`.
    async fn require_network(&self, tx: &mut Self::Tx, id: NetworkId) -> Result<Network> {
        self.get_network(tx, id).await?
            .ok_or_else(|| Error::NotFound(format!("Network {id}")))
    }
}
