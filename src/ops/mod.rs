//! Graph operations.
//!
//! Everything that touches the store lives here, as `impl` blocks on the
//! model types. Each operation takes the store and the caller's
//! transaction explicitly; nothing is cached on the entities, so graph
//! state is always whatever the store's edge table says it is.

pub mod node;
pub mod transmit;
pub mod records;
pub mod network;

pub use network::NetworkSummary;
pub use transmit::{ToWhom, TransmitPlan, What};
