//! Handler traits invoked by the dispatch engine, and the context passed to
//! them (spec.md §4.4 step 8: "a context carrying the session reference and
//! any transport-supplied context values").

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::protocol::{CallToolResult, GetPromptResult, ReadResourceResult};
use crate::server::error::ServerResult;

/// Passed to every handler and hook invocation.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub session_id: String,
    /// Values the transport attached to this call (e.g. auth claims from a
    /// per-transport context-enrichment hook). Opaque to the dispatch core.
    pub transport_context: HashMap<String, String>,
}

impl RequestContext {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            transport_context: HashMap::new(),
        }
    }

    pub fn with_transport_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.transport_context.insert(key.into(), value.into());
        self
    }
}

#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, ctx: &RequestContext, arguments: Value) -> ServerResult<CallToolResult>;
}

#[async_trait]
pub trait PromptHandler: Send + Sync {
    async fn get(
        &self,
        ctx: &RequestContext,
        arguments: HashMap<String, String>,
    ) -> ServerResult<GetPromptResult>;
}

#[async_trait]
pub trait ResourceHandler: Send + Sync {
    async fn read(&self, ctx: &RequestContext, uri: &str) -> ServerResult<ReadResourceResult>;
}

/// Invoked for inbound notifications whose method matches a registered
/// prefix; multiple listeners per method run in registration order.
#[async_trait]
pub trait NotificationListener: Send + Sync {
    async fn on_notification(&self, ctx: &RequestContext, method: &str, params: Option<Value>);
}

/// `(ctx, tools) -> tools`, applied to `tools/list` output after session
/// overrides are merged (spec.md §4.4, "Tool filter").
pub type ToolFilter = std::sync::Arc<
    dyn Fn(&RequestContext, Vec<crate::protocol::Tool>) -> Vec<crate::protocol::Tool> + Send + Sync,
>;
