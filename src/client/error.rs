//! Error taxonomy for `ClientCore` (spec.md §7, client-facing surface).

use thiserror::Error;

use crate::correlation::CorrelationError;
use crate::protocol::JsonRpcErrorObject;

#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("correlation failure: {0}")]
    Correlation(#[from] CorrelationError),

    /// A well-formed JSON-RPC error response from the remote peer, passed
    /// through verbatim rather than flattened into a string.
    #[error("server returned error {code}: {message}", code = .0.code, message = .0.message)]
    Remote(JsonRpcErrorObject),

    #[error("response did not match the expected shape: {0}")]
    InvalidResponse(String),

    #[error("client not initialized; call initialize() first")]
    NotInitialized,

    #[error("client already initialized")]
    AlreadyInitialized,

    #[error("transport error: {0}")]
    Transport(String),
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;
