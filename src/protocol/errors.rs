//! Error and error-code types for the JSON-RPC / MCP protocol layer.

use thiserror::Error;

use super::message::JsonRpcErrorObject;

/// JSON-RPC 2.0 standard error codes (spec.md §6).
pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
}

/// Errors raised while decoding or validating a JSON-RPC frame.
#[derive(Debug, Clone, Error)]
pub enum ProtocolError {
    /// The bytes were not valid JSON.
    #[error("parse error: {0}")]
    ParseError(String),

    /// The JSON was valid but violated the JSON-RPC 2.0 envelope.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        ProtocolError::ParseError(err.to_string())
    }
}

impl ProtocolError {
    /// The JSON-RPC error code this protocol error maps onto on the wire.
    pub fn error_code(&self) -> i32 {
        match self {
            ProtocolError::ParseError(_) => error_codes::PARSE_ERROR,
            ProtocolError::InvalidRequest(_) => error_codes::INVALID_REQUEST,
        }
    }

    /// Render as the `error` object of a JSON-RPC response.
    pub fn to_error_object(&self) -> JsonRpcErrorObject {
        JsonRpcErrorObject::new(self.error_code(), self.to_string())
    }
}
