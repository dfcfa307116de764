//! Domain logic for remote-write ingestion
//!
//! - `consumers` - downstream metrics/traces/logs capabilities
//! - `error` - error taxonomy for decoding, extraction and admission
//! - `remote_write` - extraction, dispatch and forwarding

pub mod consumers;
pub mod error;
pub mod remote_write;

pub use consumers::{
    LoggingLogsConsumer, LoggingMetricsConsumer, LoggingTracesConsumer, LogsConsumer,
    MetricsConsumer, TracesConsumer,
};
pub use error::{ConsumerError, DecodeError, ExtractionError, IngestError, ServerError};
pub use remote_write::Forwarder;
