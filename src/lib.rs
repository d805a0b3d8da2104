//! # wallace: Information Propagation Graphs for Networked Experiments
//!
//! Participants are nodes in a directed graph. Information they author
//! flows along directed edges (vectors) as discrete transmission records,
//! and every derivation of information is recorded for provenance.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `GraphStore` is the contract between graph operations and storage
//! 2. **Clean DTOs**: `Node`, `Vector`, `Info`, `Transmission` cross all boundaries
//! 3. **Edges are rows**: degree, successors and membership are always queried, never cached
//! 4. **Explicit context**: every operation takes the store and the caller's transaction
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use wallace::{MemoryStore, Network, NetworkKind, Node, NodeKind, NodeRole, Info, RetryPolicy};
//! use wallace::behavior::ReplicatorAgent;
//! use wallace::tx::serialized;
//!
//! # async fn example() -> wallace::Result<()> {
//! let store = MemoryStore::new();
//!
//! serialized(&store, &RetryPolicy::default(), async |tx| {
//!     let net = Network::create(&store, tx, NetworkKind::Base).await?;
//!     let mut agent = Node::create(&store, tx, NodeKind::agent()).await?;
//!     net.add_agent(&store, tx, &mut agent).await?;
//!
//!     let mut source = Node::create(&store, tx, NodeKind::source()).await?;
//!     net.add_source_global(&store, tx, &mut source).await?;
//!
//!     let info = Info::create(&store, tx, &source, "0110").await?;
//!     source.transmit(&store, tx, &ReplicatorAgent, Some(info.into()), Some(NodeRole::Agent.into())).await?;
//!     agent.receive_all(&store, tx, &ReplicatorAgent).await?;
//!     Ok(())
//! }).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Storage Backends
//!
//! | Backend | Feature | Description |
//! |---------|---------|-------------|
//! | Memory | (default) | Snapshot-isolated in-memory store for testing/embedding |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod storage;
pub mod tx;
pub mod ops;
pub mod behavior;
pub mod config;
pub mod export;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    Clock, Timestamp,
    Node, NodeId, NodeKind, NodeRole, NodeFilter, NodeStatus,
    Vector, VectorId, VectorStatus,
    Info, InfoId, InfoFilter,
    Transmission, TransmissionId,
    Transformation, TransformationId,
    Network, NetworkId, NetworkKind,
};

// ============================================================================
// Re-exports: Storage
// ============================================================================

pub use storage::{GraphStore, BackendConfig, MemoryStore};

// ============================================================================
// Re-exports: Transactions
// ============================================================================

pub use tx::{Transaction, TxMode, TxId, Isolation, Message, Notifier, MessageLog, RetryPolicy};

// ============================================================================
// Re-exports: Operations
// ============================================================================

pub use ops::{What, ToWhom, TransmitPlan, NetworkSummary};
pub use behavior::NodeBehavior;
pub use config::Config;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Write-once violation: contents of info {info} are already set")]
    WriteOnceViolation { info: InfoId },

    #[error("Ownership error: node {node} is not the origin of info {info}")]
    Ownership { node: NodeId, info: InfoId },

    #[error("No connection: node {from} has no vector to node {to}")]
    NoConnection { from: NodeId, to: NodeId },

    #[error("Empty content: node {node} resolved nothing to transmit")]
    EmptyContent { node: NodeId },

    #[error("Empty recipients: node {node} resolved nobody to transmit to")]
    EmptyRecipient { node: NodeId },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Conceptual error: {0}")]
    Conceptual(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Transaction error: {0}")]
    TxError(String),

    #[error("Serialization conflict: {0}")]
    Conflict(String),

    #[error("Could not commit serialized transaction after {attempts} attempts")]
    RetryExhausted { attempts: u32 },

    #[error("Config error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether retrying the enclosing transaction may succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
