//! The transport abstraction and its four concrete implementations.
//!
//! A `Transport` carries `Frame`s bidirectionally and hides the wire format
//! from everything above it. It is event-driven: inbound frames are pushed to
//! a registered [`FrameHandler`] rather than pulled with a blocking `receive`,
//! so one handler implementation (the correlator) works unmodified across
//! stdio, SSE, Streamable HTTP, and in-process transports.

pub mod error;
pub mod in_process;
pub mod sse;
pub mod stdio;
pub mod streamable_http;

pub use error::{TransportError, TransportResult};

use async_trait::async_trait;

use crate::protocol::{Frame, JsonRpcErrorObject};

/// Serializes a JSON-RPC error object for the HTTP transports, which must
/// fail requests with a structured body rather than a bare status code or
/// plain-text string (spec.md §7).
pub(crate) fn json_rpc_error_body(code: i32, message: impl Into<String>) -> Vec<u8> {
    serde_json::to_vec(&JsonRpcErrorObject::new(code, message)).unwrap_or_default()
}

/// Callback surface a `Transport` drives as frames arrive or the connection
/// state changes. The correlator is the canonical implementor on the client
/// side; `ServerCore` driving code is the canonical implementor on the server
/// side (grounded on the teacher's `MessageHandler`, `protocol/transport.rs`).
#[async_trait]
pub trait FrameHandler: Send + Sync {
    /// Called for every frame the transport reads off the wire.
    async fn handle_frame(&self, frame: Frame);

    /// Called when the transport hits an error it cannot recover from
    /// without tearing down the connection.
    async fn handle_error(&self, error: TransportError);

    /// Called once, after the transport has finished shutting down.
    async fn handle_close(&self);
}

/// Decouples server-side transport drivers from `ServerCore` itself: the
/// stdio/SSE/Streamable-HTTP listen loops only need something that turns an
/// inbound frame into an optional response frame. `ServerCore::handle` is the
/// canonical implementor.
#[async_trait]
pub trait RequestProcessor: Send + Sync {
    /// `session_id` is `None` for single-session transports (stdio); HTTP
    /// transports pass the id they assigned at connect time.
    async fn process(&self, session_id: Option<String>, frame: Frame) -> Option<Frame>;
}

/// Carries frames for one connected peer. Implementations own their I/O
/// resources (pipes, HTTP bodies, channels) and release them on `close`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Starts the transport: spawns the reader loop, opens the connection,
    /// or binds the listener, depending on the concrete transport.
    async fn start(&mut self) -> TransportResult<()>;

    /// Sends a single frame. For request/response correlation the caller
    /// (the correlator) is responsible for matching the eventual reply
    /// delivered through the registered `FrameHandler`.
    async fn send(&self, frame: &Frame) -> TransportResult<()>;

    /// Registers the handler driven by inbound frames and lifecycle events.
    /// Replaces any handler registered previously.
    fn set_frame_handler(&mut self, handler: std::sync::Arc<dyn FrameHandler>);

    /// Gracefully shuts the transport down. Idempotent.
    async fn close(&mut self) -> TransportResult<()>;

    /// The peer's session id, for transports that carry one (HTTP variants).
    /// Single-connection transports such as stdio return `None`.
    fn session_id(&self) -> Option<String>;

    /// `true` once `start` has succeeded and `close` has not yet been called.
    fn is_connected(&self) -> bool;

    /// Static identifier used in logs (`"stdio"`, `"sse"`, `"streamable-http"`,
    /// `"in-process"`).
    fn transport_type(&self) -> &'static str;
}
