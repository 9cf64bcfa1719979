//! A Model Context Protocol (MCP) runtime: a bidirectional JSON-RPC 2.0
//! messaging engine, a pluggable transport layer, and a typed server
//! dispatch engine, built as three tightly coupled subsystems.
//!
//! # Architecture
//!
//! - **`protocol`** — the `Frame` codec (`JsonRpcRequest`/`Response`/
//!   `Notification`) and the MCP value types (capabilities, `Tool`,
//!   `Prompt`, `Resource`, the `initialize` handshake shapes).
//! - **`transport`** — the `Transport` trait plus four concrete carriers:
//!   subprocess stdio (`transport::stdio`), Server-Sent Events
//!   (`transport::sse`), Streamable HTTP (`transport::streamable_http`), and
//!   an in-process pipe pair (`transport::in_process`) used for testing.
//! - **`correlation`** — `Correlator`, which parks outbound requests on a
//!   one-shot rendezvous keyed by request id, demultiplexes inbound
//!   responses, and fans inbound notifications out to a single handler.
//! - **`client`** — `ClientCore`, a typed request API built on a
//!   `Correlator` + `Transport` pair.
//! - **`server`** — `ServerCore`, the capability-gated method router, plus
//!   its catalog, hooks, middleware chain, and `SessionRegistry`.
//!
//! A host application drives a server through `ClientCore`; a server
//! implementation registers tools, prompts, and resources on a `ServerCore`
//! and lets a transport feed frames into it.
//!
//! None of this crate's types are generic over a serialization format wider
//! than JSON — the wire format is JSON-RPC 2.0, full stop.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod client;
pub mod correlation;
pub mod protocol;
pub mod server;
pub mod transport;

pub use client::{ClientConfig, ClientCore, ClientCoreBuilder, ClientError, ClientResult};
pub use correlation::{CorrelationConfig, CorrelationError, CorrelationResult, Correlator, RpcOutcome};
pub use protocol::{
    Frame, JsonRpcErrorObject, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ProtocolError,
    RequestId,
};
pub use server::{
    HookContext, Hooks, Middleware, RequestContext, ServerCatalog, ServerConfig, ServerCore,
    ServerCoreBuilder, ServerError, ServerResult, Session, SessionRegistry, SessionState,
};
pub use transport::{FrameHandler, RequestProcessor, Transport, TransportError, TransportResult};
