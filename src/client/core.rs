//! The client-side request API on top of a `Correlator`/`Transport` pair
//! (spec.md §4.3). Grounded on the teacher's `integration::client::McpClient`,
//! with the correlator doing the parking/timeout work `McpClient` used to do
//! with its own `pending_requests` map.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::client::config::ClientConfig;
use crate::client::error::{ClientError, ClientResult};
use crate::correlation::{CorrelationConfig, Correlator};
use crate::protocol::{
    methods, notifications, CallToolParams, CallToolResult, CompleteParams, CompleteResult,
    GetPromptParams, GetPromptResult, InitializeParams, InitializeResult, ListPromptsResult,
    ListResourceTemplatesResult, ListResourcesResult, ListToolsResult, PaginatedParams,
    ReadResourceParams, ReadResourceResult, ServerCapabilities, SetLevelParams, SubscribeParams,
    Tool, UnsubscribeParams,
};
use crate::transport::Transport;

/// Typed request/response API a host application drives an MCP server with.
///
/// Everything but `initialize` fails fast with `ClientError::NotInitialized`
/// until the handshake completes — spec.md §4.3's "courtesy guard".
pub struct ClientCore<T: Transport + 'static> {
    correlator: Arc<Correlator<T>>,
    config: ClientConfig,
    initialized: AtomicBool,
    server_capabilities: tokio::sync::RwLock<Option<ServerCapabilities>>,
}

impl<T: Transport + 'static> ClientCore<T> {
    pub fn new(transport: T, config: ClientConfig, correlation_config: CorrelationConfig) -> Arc<Self> {
        Arc::new(Self {
            correlator: Correlator::new(transport, correlation_config),
            config,
            initialized: AtomicBool::new(false),
            server_capabilities: tokio::sync::RwLock::new(None),
        })
    }

    /// Starts the underlying transport. Must be called before `initialize`.
    pub async fn start(&self) -> ClientResult<()> {
        self.correlator
            .start()
            .await
            .map_err(ClientError::Correlation)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub async fn server_capabilities(&self) -> Option<ServerCapabilities> {
        self.server_capabilities.read().await.clone()
    }

    /// Sends `initialize`, then fires `notifications/initialized` on success,
    /// then marks the session initialized (spec.md §4.3).
    pub async fn initialize(&self, ctx: CancellationToken) -> ClientResult<InitializeResult> {
        if self.initialized.load(Ordering::SeqCst) {
            return Err(ClientError::AlreadyInitialized);
        }

        let params = InitializeParams {
            protocol_version: self.config.protocol_version.clone(),
            capabilities: self.config.capabilities.clone(),
            client_info: self.config.client_info.clone(),
        };
        let result: InitializeResult = self
            .call_unchecked(methods::INITIALIZE, Some(params), ctx)
            .await?;

        self.correlator
            .send_notification(notifications::INITIALIZED, None)
            .await
            .map_err(ClientError::Correlation)?;

        *self.server_capabilities.write().await = Some(result.capabilities.clone());
        self.initialized.store(true, Ordering::SeqCst);
        debug!(server = %result.server_info.name, "mcp session initialized");
        Ok(result)
    }

    pub async fn ping(&self, ctx: CancellationToken) -> ClientResult<()> {
        let _: serde_json::Value = self.call(methods::PING, None::<()>, ctx).await?;
        Ok(())
    }

    pub async fn list_resources(
        &self,
        ctx: CancellationToken,
        cursor: Option<String>,
    ) -> ClientResult<ListResourcesResult> {
        self.call(methods::RESOURCES_LIST, Some(PaginatedParams { cursor }), ctx)
            .await
    }

    pub async fn list_resource_templates(
        &self,
        ctx: CancellationToken,
        cursor: Option<String>,
    ) -> ClientResult<ListResourceTemplatesResult> {
        self.call(
            methods::RESOURCES_TEMPLATES_LIST,
            Some(PaginatedParams { cursor }),
            ctx,
        )
        .await
    }

    pub async fn read_resource(
        &self,
        ctx: CancellationToken,
        uri: impl Into<String>,
    ) -> ClientResult<ReadResourceResult> {
        self.call(
            methods::RESOURCES_READ,
            Some(ReadResourceParams { uri: uri.into() }),
            ctx,
        )
        .await
    }

    pub async fn subscribe(&self, ctx: CancellationToken, uri: impl Into<String>) -> ClientResult<()> {
        let _: serde_json::Value = self
            .call(
                methods::RESOURCES_SUBSCRIBE,
                Some(SubscribeParams { uri: uri.into() }),
                ctx,
            )
            .await?;
        Ok(())
    }

    pub async fn unsubscribe(&self, ctx: CancellationToken, uri: impl Into<String>) -> ClientResult<()> {
        let _: serde_json::Value = self
            .call(
                methods::RESOURCES_UNSUBSCRIBE,
                Some(UnsubscribeParams { uri: uri.into() }),
                ctx,
            )
            .await?;
        Ok(())
    }

    pub async fn list_prompts(
        &self,
        ctx: CancellationToken,
        cursor: Option<String>,
    ) -> ClientResult<ListPromptsResult> {
        self.call(methods::PROMPTS_LIST, Some(PaginatedParams { cursor }), ctx)
            .await
    }

    pub async fn get_prompt(
        &self,
        ctx: CancellationToken,
        name: impl Into<String>,
        arguments: std::collections::HashMap<String, String>,
    ) -> ClientResult<GetPromptResult> {
        self.call(
            methods::PROMPTS_GET,
            Some(GetPromptParams { name: name.into(), arguments }),
            ctx,
        )
        .await
    }

    pub async fn list_tools(
        &self,
        ctx: CancellationToken,
        cursor: Option<String>,
    ) -> ClientResult<ListToolsResult> {
        self.call(methods::TOOLS_LIST, Some(PaginatedParams { cursor }), ctx)
            .await
    }

    /// Convenience over `list_tools` for callers that don't need pagination.
    pub async fn tools(&self, ctx: CancellationToken) -> ClientResult<Vec<Tool>> {
        Ok(self.list_tools(ctx, None).await?.tools)
    }

    pub async fn call_tool(
        &self,
        ctx: CancellationToken,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> ClientResult<CallToolResult> {
        self.call(
            methods::TOOLS_CALL,
            Some(CallToolParams { name: name.into(), arguments }),
            ctx,
        )
        .await
    }

    pub async fn set_log_level(
        &self,
        ctx: CancellationToken,
        level: crate::protocol::LogLevel,
    ) -> ClientResult<()> {
        let _: serde_json::Value = self
            .call(methods::LOGGING_SET_LEVEL, Some(SetLevelParams { level }), ctx)
            .await?;
        Ok(())
    }

    pub async fn complete(
        &self,
        ctx: CancellationToken,
        params: CompleteParams,
    ) -> ClientResult<CompleteResult> {
        self.call(methods::COMPLETION_COMPLETE, Some(params), ctx).await
    }

    /// Registers the handler invoked for every inbound notification
    /// (server→client push). Replaces any prior registration.
    pub async fn on_notification(&self, handler: crate::correlation::NotificationHandler) {
        self.correlator.on_notification(handler).await;
    }

    pub async fn close(&self) -> ClientResult<()> {
        self.correlator.close().await.map_err(ClientError::Correlation)
    }

    async fn call<P: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<P>,
        ctx: CancellationToken,
    ) -> ClientResult<R> {
        if !self.initialized.load(Ordering::SeqCst) {
            return Err(ClientError::NotInitialized);
        }
        self.call_unchecked(method, params, ctx).await
    }

    async fn call_unchecked<P: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<P>,
        ctx: CancellationToken,
    ) -> ClientResult<R> {
        let params = params
            .map(|p| serde_json::to_value(p))
            .transpose()
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;

        let outcome = self
            .correlator
            .send_request(method, params, ctx)
            .await
            .map_err(ClientError::Correlation)?;

        match outcome {
            Ok(value) => serde_json::from_value(value)
                .map_err(|e| ClientError::InvalidResponse(e.to_string())),
            Err(error) => Err(ClientError::Remote(error)),
        }
    }
}

/// Mirrors `ServerCoreBuilder`'s shape on the client side
/// (`integration::mcp::server::McpServerBuilder` grounding, applied in
/// reverse).
pub struct ClientCoreBuilder {
    config: ClientConfig,
    correlation_config: CorrelationConfig,
}

impl ClientCoreBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            correlation_config: CorrelationConfig::default(),
        }
    }

    pub fn client_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.config.client_info = crate::protocol::ClientInfo {
            name: name.into(),
            version: version.into(),
        };
        self
    }

    pub fn capabilities(mut self, capabilities: crate::protocol::ClientCapabilities) -> Self {
        self.config.capabilities = capabilities;
        self
    }

    pub fn protocol_version(mut self, version: crate::protocol::ProtocolVersion) -> Self {
        self.config.protocol_version = version;
        self
    }

    pub fn correlation_config(mut self, correlation_config: CorrelationConfig) -> Self {
        self.correlation_config = correlation_config;
        self
    }

    pub fn build<T: Transport + 'static>(self, transport: T) -> Arc<ClientCore<T>> {
        ClientCore::new(transport, self.config, self.correlation_config)
    }
}

impl Default for ClientCoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Frame, JsonRpcResponse, ServerInfo};
    use crate::transport::in_process::InProcessTransport;
    use crate::transport::{FrameHandler, TransportError};
    use std::sync::Arc as StdArc;

    /// Replies to every inbound request with a canned `initialize` result,
    /// echoing the request id back so the correlator can match it.
    struct MockServer(StdArc<tokio::sync::Mutex<InProcessTransport>>);

    #[async_trait::async_trait]
    impl FrameHandler for MockServer {
        async fn handle_frame(&self, frame: Frame) {
            if let Frame::Request(req) = frame {
                let result = serde_json::to_value(InitializeResult {
                    protocol_version: crate::protocol::ProtocolVersion::current(),
                    capabilities: ServerCapabilities::default(),
                    server_info: ServerInfo { name: "mock-server".into(), version: "1.0.0".into() },
                    instructions: None,
                })
                .unwrap();
                let response = JsonRpcResponse::success(result, req.id);
                let _ = self.0.lock().await.send(&Frame::Response(response)).await;
            }
        }
        async fn handle_error(&self, _error: TransportError) {}
        async fn handle_close(&self) {}
    }

    #[tokio::test]
    async fn initialize_marks_client_ready_and_stores_capabilities() {
        let (client_side, server_side) = InProcessTransport::pair();
        let server_side = StdArc::new(tokio::sync::Mutex::new(server_side));
        let handler = StdArc::new(MockServer(StdArc::clone(&server_side)));
        server_side.lock().await.set_frame_handler(handler);
        server_side.lock().await.start().await.unwrap();

        let client = ClientCoreBuilder::new()
            .client_info("test-client", "1.0.0")
            .build(client_side);
        client.start().await.unwrap();

        let result = client.initialize(CancellationToken::new()).await.unwrap();
        assert_eq!(result.server_info.name, "mock-server");
        assert!(client.is_initialized());
        assert!(client.server_capabilities().await.is_some());
    }

    #[tokio::test]
    async fn non_initialize_calls_fail_fast_before_handshake() {
        let (client_side, _server_side) = InProcessTransport::pair();
        let client = ClientCoreBuilder::new().build(client_side);
        client.start().await.unwrap();

        let result = client.ping(CancellationToken::new()).await;
        assert!(matches!(result, Err(ClientError::NotInitialized)));
    }
}
