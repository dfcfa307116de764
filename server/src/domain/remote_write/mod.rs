//! Prometheus remote-write ingestion
//!
//! - `extract` - turn a decoded `WriteRequest` into canonical entities
//! - `histogram` - native histogram span/delta resolution
//! - `dispatch` - non-blocking enqueue onto the dispatch queues
//! - `forward` - drain the queues into downstream consumers

mod dispatch;
mod extract;
mod forward;
mod histogram;

pub use dispatch::enqueue_series;
pub use extract::{ExtractedSeries, Extraction, extract_write_request};
pub use forward::{ForwardStats, Forwarder};
