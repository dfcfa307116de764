//! Ingestion error taxonomy

use thiserror::Error;

use crate::data::queues::{QueueError, QueueKind};

/// Why a request body could not be turned into a `WriteRequest`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("failed to read request body: {0}")]
    Body(String),

    #[error("snappy decode error: {0}")]
    Snappy(String),

    #[error("decompressed body is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },

    #[error("protobuf decode error: {0}")]
    Protobuf(String),
}

/// A single item of an otherwise valid request that could not be converted
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("series #{index} has no labels")]
    EmptySeries { index: usize },

    #[error("series #{index} has a label with an empty name")]
    EmptyLabelName { index: usize },

    #[error("exemplar #{exemplar} of series {series} has a label with an empty name")]
    InvalidExemplar { series: String, exemplar: usize },

    #[error("histogram #{histogram} of series {series}: {reason}")]
    InvalidHistogram {
        series: String,
        histogram: usize,
        reason: String,
    },

    #[error("metadata #{index} has an empty metric family name")]
    InvalidMetadata { index: usize },
}

/// Failure reported by a downstream consumer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{consumer} consumer failed: {message}")]
pub struct ConsumerError {
    pub consumer: &'static str,
    pub message: String,
}

impl ConsumerError {
    pub fn new(consumer: &'static str, message: impl Into<String>) -> Self {
        Self {
            consumer,
            message: message.into(),
        }
    }
}

/// Everything a single request can report through the `Reporter`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("{queue} queue is full")]
    AdmissionRejected { queue: QueueKind },

    #[error("{queue} queue is closed")]
    QueueClosed { queue: QueueKind },

    #[error(transparent)]
    Downstream(#[from] ConsumerError),
}

impl From<QueueError> for IngestError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Full(queue) => IngestError::AdmissionRejected { queue },
            QueueError::Closed(queue) => IngestError::QueueClosed { queue },
        }
    }
}

/// Errors returned by `IngestServer::listen_and_serve`
#[derive(Error, Debug)]
pub enum ServerError {
    /// Missing collaborator or wrong lifecycle state; never retried
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}
