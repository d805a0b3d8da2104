//! Transaction scopes and the serializable retry loop.
//!
//! ```rust,no_run
//! use wallace::{MemoryStore, Node, NodeKind, RetryPolicy};
//! use wallace::tx::serialized;
//!
//! # async fn example() -> wallace::Result<()> {
//! let store = MemoryStore::new();
//! let node = serialized(&store, &RetryPolicy::default(), async |tx| {
//!     Node::create(&store, tx, NodeKind::agent()).await
//! }).await?;
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::storage::GraphStore;
use crate::tx::{Isolation, TxMode};
use crate::{Error, Result};

/// How many times a serializable operation is attempted before giving up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 100 }
    }
}

/// Run `op` in one transaction: commit on success, roll back on error.
pub async fn scoped<S, T, F>(store: &S, mode: TxMode, op: F) -> Result<T>
where
    S: GraphStore,
    F: AsyncFnOnce(&mut S::Tx) -> Result<T>,
{
    let mut tx = store.begin_tx(mode, Isolation::ReadCommitted).await?;
    match op(&mut tx).await {
        Ok(value) => {
            store.commit_tx(tx).await?;
            Ok(value)
        }
        Err(err) => {
            debug!(error = %err, "operation failed, rolling back");
            store.rollback_tx(tx).await?;
            Err(err)
        }
    }
}

/// Run `op` in a serializable read-write transaction, retrying the whole
/// operation whenever it ends in [`Error::Conflict`].
///
/// Any other error is returned immediately after rollback.
pub async fn serialized<S, T, F>(store: &S, policy: &RetryPolicy, mut op: F) -> Result<T>
where
    S: GraphStore,
    F: AsyncFnMut(&mut S::Tx) -> Result<T>,
{
    for attempt in 1..=policy.max_attempts {
        let mut tx = store.begin_tx(TxMode::ReadWrite, Isolation::Serializable).await?;
        let outcome = match op(&mut tx).await {
            Ok(value) => store.commit_tx(tx).await.map(|()| value),
            Err(err) => {
                store.rollback_tx(tx).await?;
                Err(err)
            }
        };

        match outcome {
            Err(err) if err.is_conflict() => {
                warn!(attempt, max_attempts = policy.max_attempts, "serialization conflict, retrying");
            }
            other => return other,
        }
    }

    Err(Error::RetryExhausted { attempts: policy.max_attempts })
}
