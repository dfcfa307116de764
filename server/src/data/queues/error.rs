//! Dispatch queue error types

use std::fmt;

use super::QueueKind;

/// Error type for queue operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// Queue at capacity (backpressure)
    Full(QueueKind),
    /// Consumer side closed, no more items accepted
    Closed(QueueKind),
}

impl std::error::Error for QueueError {}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::Full(kind) => write!(f, "{} queue full", kind),
            QueueError::Closed(kind) => write!(f, "{} queue closed", kind),
        }
    }
}
