//! Prometheus remote-write HTTP endpoint

mod encoding;
mod write;

pub use encoding::decode_write_request;

use std::sync::Arc;

use axum::Router;
use axum::routing::post;

use crate::core::reporter::Reporter;
use crate::data::queues::QueueSenders;
use crate::domain::consumers::LogsConsumer;

#[derive(Clone)]
pub struct RemoteWriteState {
    pub queues: QueueSenders,
    /// Metadata bypasses the queues and goes straight to the logs consumer
    pub logs: Arc<dyn LogsConsumer>,
    pub reporter: Arc<dyn Reporter>,
    /// Advertised in `Retry-After` on 429/503
    pub retry_after_secs: u64,
    /// Compressed body limit, enforced while reading so oversized bodies
    /// are still reported
    pub max_body_bytes: usize,
    pub max_decompressed_bytes: usize,
}

pub fn routes(write_path: &str, state: RemoteWriteState) -> Router {
    Router::new()
        .route(write_path, post(write::write))
        .with_state(state)
}
