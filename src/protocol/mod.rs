//! JSON-RPC 2.0 frame codec and MCP value types.
//!
//! This module has no transport or session-management logic — it is the
//! leaf layer everything else builds on (spec.md §2, `Frame` codec, 5% share).

pub mod constants;
pub mod errors;
pub mod message;
pub mod types;

pub use constants::{methods, notifications};
pub use errors::{error_codes, ProtocolError};
pub use message::{
    Frame, JsonRpcErrorObject, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId,
};
pub use types::*;
