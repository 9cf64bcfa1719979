//! Transport-level error types shared by every transport implementation.

use thiserror::Error;

/// Errors a `Transport` can surface (spec.md §7, "Transport errors").
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("not connected")]
    NotConnected,

    #[error("transport disconnected")]
    Disconnected,

    #[error("child process exited: {status}")]
    ProcessExited { status: String },

    #[error("HTTP status {0}")]
    HttpStatus(u16),

    #[error("write failed: {0}")]
    WriteFailed(String),

    #[error("read failed: {0}")]
    ReadFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] crate::protocol::ProtocolError),

    #[error("{0}")]
    Other(String),
}

pub type TransportResult<T> = std::result::Result<T, TransportError>;
