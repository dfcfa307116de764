//! Data layer
//!
//! - `prompb` - remote-write 1.0 wire messages
//! - `types` - canonical entities handed to consumers
//! - `queues` - bounded per-kind dispatch queues

pub mod prompb;
pub mod queues;
pub mod types;

pub use queues::{DispatchQueues, QueueCapacities, QueueKind};
