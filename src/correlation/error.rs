//! Error types for the correlation system.

use thiserror::Error;

use crate::protocol::RequestId;

/// Errors produced by the correlator while parking, delivering, or cancelling
/// outbound requests (spec.md §7, "Delivery errors").
#[derive(Debug, Clone, Error)]
pub enum CorrelationError {
    #[error("request {id} timed out")]
    Timeout { id: RequestId },

    #[error("request {id} was cancelled")]
    Cancelled { id: RequestId },

    #[error("transport disconnected before request {id} completed")]
    Disconnected { id: RequestId },

    #[error("child process exited with {status} before request {id} completed")]
    ProcessExited { id: RequestId, status: String },

    #[error("request {id} not found (already completed or unknown)")]
    RequestNotFound { id: RequestId },

    #[error("transport error while sending request {id}: {message}")]
    TransportError { id: RequestId, message: String },

    #[error("maximum pending requests exceeded")]
    CapacityExceeded,
}

pub type CorrelationResult<T> = std::result::Result<T, CorrelationError>;
