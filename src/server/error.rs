//! Error taxonomy for the server dispatch engine (spec.md §7: Lifecycle and
//! Protocol errors the server surfaces).

use thiserror::Error;

use crate::protocol::error_codes;

#[derive(Debug, Clone, Error)]
pub enum ServerError {
    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("internal error: {0}")]
    InternalError(String),

    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("prompt not found: {0}")]
    PromptNotFound(String),

    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    #[error("session {0} not found")]
    SessionNotFound(String),

    #[error("session {0} already registered")]
    SessionExists(String),

    #[error("session not yet initialized")]
    NotInitialized,

    #[error("session already initialized")]
    AlreadyInitialized,

    #[error("notification sink is full")]
    ChannelBlocked,
}

impl ServerError {
    /// Maps this error onto the closest JSON-RPC 2.0 error code, per
    /// spec.md §7's propagation policy.
    pub fn error_code(&self) -> i32 {
        match self {
            ServerError::MethodNotFound(_) => error_codes::METHOD_NOT_FOUND,
            ServerError::InvalidParams(_) => error_codes::INVALID_PARAMS,
            // Capability gating failures and unresolved catalog lookups are
            // reported as MethodNotFound, matching spec.md §4.4 step 4's
            // "spec-mandated; not a permission error" rule.
            ServerError::ToolNotFound(_)
            | ServerError::PromptNotFound(_)
            | ServerError::ResourceNotFound(_) => error_codes::METHOD_NOT_FOUND,
            ServerError::SessionNotFound(_)
            | ServerError::SessionExists(_)
            | ServerError::NotInitialized
            | ServerError::AlreadyInitialized
            | ServerError::ChannelBlocked
            | ServerError::InternalError(_) => error_codes::INTERNAL_ERROR,
        }
    }
}

pub type ServerResult<T> = std::result::Result<T, ServerError>;
