//! Transaction management.
//!
//! Every graph operation runs inside a transaction supplied by the caller.
//! Messages queued during a transaction reach the registered [`Notifier`]s
//! if and only if that transaction commits.

pub mod retry;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

pub use retry::{scoped, serialized, RetryPolicy};

/// Transaction mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxMode {
    ReadOnly,
    ReadWrite,
}

/// Isolation level requested at begin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Isolation {
    /// Last committer wins; commit never reports a conflict.
    #[default]
    ReadCommitted,
    /// Commit fails with [`crate::Error::Conflict`] if anything this
    /// transaction read or wrote was committed by someone else meanwhile.
    Serializable,
}

/// Opaque transaction identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxId(pub u64);

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tx-{}", self.0)
    }
}

/// A post-commit notification: a payload published on a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub channel: String,
    pub payload: String,
}

/// Transaction trait that all backends must implement.
pub trait Transaction: Send + Sync {
    fn mode(&self) -> TxMode;
    fn isolation(&self) -> Isolation;
    fn id(&self) -> TxId;

    /// Enqueue a message for delivery after commit.
    fn queue_message(&mut self, channel: &str, payload: String);

    /// Messages queued so far, in order.
    fn outbox(&self) -> &[Message];
}

/// Receiver of committed messages.
pub trait Notifier: Send + Sync {
    fn publish(&self, message: &Message);
}

/// Notifier that keeps every published message in memory.
#[derive(Debug, Default)]
pub struct MessageLog {
    messages: Mutex<Vec<Message>>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().clone()
    }

    /// Remove and return everything published so far.
    pub fn drain(&self) -> Vec<Message> {
        std::mem::take(&mut *self.messages.lock())
    }
}

impl Notifier for MessageLog {
    fn publish(&self, message: &Message) {
        self.messages.lock().push(message.clone());
    }
}
