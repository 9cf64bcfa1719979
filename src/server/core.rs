//! The typed method router: capability gating, handler resolution, hooks,
//! and middleware (spec.md §4.4).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::protocol::{
    error_codes, methods, CallToolParams, CallToolResult, CompleteParams, CompleteResult, Frame,
    GetPromptParams, GetPromptResult, InitializeParams, InitializeResult, JsonRpcErrorObject,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ListPromptsResult,
    ListResourceTemplatesResult, ListResourcesResult, ListToolsResult, Prompt, ReadResourceParams,
    ReadResourceResult, Resource, ResourceTemplate, ServerCapabilities, ServerInfo, Tool,
};
use crate::server::catalog::ServerCatalog;
use crate::server::config::ServerConfig;
use crate::server::error::{ServerError, ServerResult};
use crate::server::handlers::{
    NotificationListener, PromptHandler, RequestContext, ResourceHandler, ToolHandler,
};
use crate::server::hooks::{HookContext, Hooks};
use crate::server::middleware::{Middleware, Next};
use crate::server::session::{Session, SessionRegistry, SessionState};
use crate::transport::RequestProcessor;

/// Owns the catalog and the session registry exclusively (spec.md §3
/// ownership rule). One instance serves every transport wired to it.
pub struct ServerCore {
    config: ServerConfig,
    catalog: Arc<ServerCatalog>,
    sessions: Arc<SessionRegistry>,
}

impl ServerCore {
    pub fn builder() -> ServerCoreBuilder {
        ServerCoreBuilder::new()
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    pub fn catalog(&self) -> &Arc<ServerCatalog> {
        &self.catalog
    }

    /// Registers a new session in `Connected` state; called by whatever
    /// transport glue observes a new peer.
    pub fn connect_session(&self, session_id: impl Into<String>) -> ServerResult<Arc<Session>> {
        let (session, _notifications) =
            Session::new(session_id, self.config.notification_sink_capacity);
        self.sessions.register(Arc::clone(&session))?;
        Ok(session)
    }

    pub async fn disconnect_session(&self, session_id: &str) {
        self.sessions.unregister(session_id).await;
    }

    // -- Catalog mutation, delegated with this server's capability flags --

    pub async fn add_tool(&self, tool: Tool, handler: Arc<dyn ToolHandler>) {
        let enabled = self.config.capabilities.tools.is_some();
        self.catalog.add_tool(&self.sessions, enabled, tool, handler).await;
    }

    pub async fn delete_tools(&self, names: &[String]) {
        let enabled = self.config.capabilities.tools.is_some();
        self.catalog.delete_tools(&self.sessions, enabled, names).await;
    }

    pub async fn add_resource(&self, resource: Resource, handler: Arc<dyn ResourceHandler>) {
        let enabled = self.config.capabilities.resources.is_some();
        self.catalog
            .add_resource(&self.sessions, enabled, resource, handler)
            .await;
    }

    pub async fn remove_resource(&self, uri: &str) {
        let enabled = self.config.capabilities.resources.is_some();
        self.catalog.remove_resource(&self.sessions, enabled, uri).await;
    }

    pub async fn add_resource_template(&self, template: ResourceTemplate) {
        self.catalog.add_resource_template(template).await;
    }

    pub async fn add_prompt(&self, prompt: Prompt, handler: Arc<dyn PromptHandler>) {
        let enabled = self.config.capabilities.prompts.is_some();
        self.catalog.add_prompt(&self.sessions, enabled, prompt, handler).await;
    }

    pub async fn remove_prompt(&self, name: &str) {
        let enabled = self.config.capabilities.prompts.is_some();
        self.catalog.remove_prompt(&self.sessions, enabled, name).await;
    }

    pub async fn add_notification_handler(&self, method: impl Into<String>, listener: Arc<dyn NotificationListener>) {
        self.catalog.add_notification_handler(method, listener).await;
    }

    pub async fn add_session_tool(&self, sid: &str, tool: Tool, handler: Arc<dyn ToolHandler>) -> ServerResult<()> {
        let session = self
            .sessions
            .get(sid)
            .ok_or_else(|| ServerError::SessionNotFound(sid.to_string()))?;
        session.add_tool(tool, handler).await;
        if session.is_initialized().await && self.config.capabilities.tools.is_some() {
            if let Err(error) = self
                .sessions
                .send_to(sid, crate::protocol::notifications::TOOLS_LIST_CHANGED, None)
                .await
            {
                self.catalog.report_notify_failure(sid, crate::protocol::notifications::TOOLS_LIST_CHANGED, &error);
            }
        }
        Ok(())
    }

    pub async fn delete_session_tools(&self, sid: &str, names: &[String]) -> ServerResult<()> {
        let session = self
            .sessions
            .get(sid)
            .ok_or_else(|| ServerError::SessionNotFound(sid.to_string()))?;
        session.delete_tools(names).await;
        Ok(())
    }

    /// The dispatch algorithm (spec.md §4.4 steps 1-9).
    pub async fn handle(&self, session_id: &str, frame: Frame) -> Option<Frame> {
        let request = match frame {
            Frame::Request(request) => request,
            Frame::Notification(notification) => {
                self.handle_notification(session_id, notification).await;
                return None;
            }
            Frame::Response(_) => {
                warn!(session_id, "server ignoring unexpected inbound response frame");
                return None;
            }
        };

        let session = match self.sessions.get(session_id) {
            Some(session) => session,
            None => {
                let (session, _rx) =
                    Session::new(session_id, self.config.notification_sink_capacity);
                if self.sessions.register(Arc::clone(&session)).is_err() {
                    self.sessions.get(session_id).expect("just raced registration")
                } else {
                    session
                }
            }
        };

        let ctx = Arc::new(RequestContext::new(session_id));
        let hook_ctx = HookContext {
            session_id: session_id.to_string(),
            method: request.method.clone(),
            request_id: Some(request.id.clone()),
        };
        self.catalog.hooks.run_before(&hook_ctx);

        let result = self.dispatch(&session, Arc::clone(&ctx), request.clone()).await;

        let response_payload = result.clone().map_err(|e| e.to_error_object());
        self.catalog.hooks.run_after(&hook_ctx, &response_payload);
        if let Err(error) = &result {
            self.catalog.hooks.run_error(&hook_ctx, error);
        }

        Some(match result {
            Ok(value) => Frame::Response(JsonRpcResponse::success(value, request.id)),
            Err(error) => Frame::Response(JsonRpcResponse::error(error.to_error_object(), Some(request.id))),
        })
    }

    async fn dispatch(&self, session: &Arc<Session>, ctx: Arc<RequestContext>, request: JsonRpcRequest) -> ServerResult<Value> {
        // Step 4: capability gating. Methods under a gated family require the
        // capability to have been declared at construction; failing this is
        // spec-mandated MethodNotFound, not a permission error.
        if !self.capability_allows(&request.method) {
            return Err(ServerError::MethodNotFound(request.method));
        }

        // initialize/ping are always legal pre-handshake; every other method
        // is permitted here regardless of session state too — a stricter
        // server may reject instead, and both are conforming per the
        // "implementations may reject" wording for pre-initialize calls.

        if request.method == methods::INITIALIZE {
            return self.handle_initialize(session, request.params).await;
        }

        let middleware = self.catalog.middleware.clone();
        if middleware.is_empty() {
            return self.invoke_resolved(session, ctx, request).await;
        }

        let catalog = Arc::clone(&self.catalog);
        let sessions = Arc::clone(&self.sessions);
        let terminal = move |ctx: Arc<RequestContext>, request: JsonRpcRequest| -> crate::server::middleware::HandlerFuture<'static> {
            let catalog = Arc::clone(&catalog);
            let sessions = Arc::clone(&sessions);
            Box::pin(async move { ServerCore::invoke_handler(&catalog, &sessions, ctx, request).await })
        };

        let next = Next::new(&middleware, &terminal);
        next.run(ctx, request).await
    }

    fn capability_allows(&self, method: &str) -> bool {
        let caps = &self.config.capabilities;
        if method.starts_with("resources/") {
            return caps.resources.is_some();
        }
        if method.starts_with("prompts/") {
            return caps.prompts.is_some();
        }
        if method.starts_with("tools/") {
            return caps.tools.is_some();
        }
        if method.starts_with("logging/") {
            return caps.logging.is_some();
        }
        true
    }

    async fn handle_initialize(&self, session: &Arc<Session>, params: Option<Value>) -> ServerResult<Value> {
        let params: InitializeParams = match params {
            Some(value) => serde_json::from_value(value).map_err(|e| ServerError::InvalidParams(e.to_string()))?,
            None => return Err(ServerError::InvalidParams("missing initialize params".into())),
        };
        if matches!(session.state().await, SessionState::Initialized | SessionState::Initializing) {
            return Err(ServerError::AlreadyInitialized);
        }
        session.set_state(SessionState::Initializing).await;
        debug!(session_id = %session.id, client = %params.client_info.name, "initialize handshake started");

        let result = InitializeResult {
            protocol_version: self.config.protocol_version.clone(),
            capabilities: self.config.capabilities.clone(),
            server_info: self.config.server_info.clone(),
            instructions: self.config.instructions.clone(),
        };
        serde_json::to_value(result).map_err(|e| ServerError::InternalError(e.to_string()))
    }

    async fn invoke_resolved(&self, session: &Arc<Session>, ctx: Arc<RequestContext>, request: JsonRpcRequest) -> ServerResult<Value> {
        Self::invoke_handler_with_session(&self.catalog, session, ctx, request).await
    }

    async fn invoke_handler(
        catalog: &Arc<ServerCatalog>,
        sessions: &Arc<SessionRegistry>,
        ctx: Arc<RequestContext>,
        request: JsonRpcRequest,
    ) -> ServerResult<Value> {
        let session = sessions
            .get(&ctx.session_id)
            .ok_or_else(|| ServerError::SessionNotFound(ctx.session_id.clone()))?;
        Self::invoke_handler_with_session(catalog, &session, ctx, request).await
    }

    async fn invoke_handler_with_session(
        catalog: &Arc<ServerCatalog>,
        session: &Arc<Session>,
        ctx: Arc<RequestContext>,
        request: JsonRpcRequest,
    ) -> ServerResult<Value> {
        match request.method.as_str() {
            methods::PING => Ok(Value::Null),

            methods::TOOLS_LIST => {
                let mut tools = catalog.all_tools().await;
                let session_tools = session.session_tools().await;
                for tool in session_tools {
                    tools.retain(|t| t.name != tool.name);
                    tools.push(tool);
                }
                if let Some(filter) = catalog.tool_filter.read().await.clone() {
                    tools = filter(&ctx, tools);
                }
                serde_json::to_value(ListToolsResult { tools, next_cursor: None })
                    .map_err(|e| ServerError::InternalError(e.to_string()))
            }

            methods::TOOLS_CALL => {
                let params: CallToolParams = decode_params(request.params)?;
                // Step 6: session-local overrides shadow globals.
                let (_, handler) = if let Some(entry) = session.tool_override(&params.name).await {
                    entry
                } else {
                    catalog
                        .get_tool(&params.name)
                        .await
                        .ok_or_else(|| ServerError::ToolNotFound(params.name.clone()))?
                };
                let result: CallToolResult = handler.call(&ctx, params.arguments).await?;
                serde_json::to_value(result).map_err(|e| ServerError::InternalError(e.to_string()))
            }

            methods::PROMPTS_LIST => {
                let prompts = catalog.all_prompts().await;
                serde_json::to_value(ListPromptsResult { prompts, next_cursor: None })
                    .map_err(|e| ServerError::InternalError(e.to_string()))
            }

            methods::PROMPTS_GET => {
                let params: GetPromptParams = decode_params(request.params)?;
                let (_, handler) = catalog
                    .get_prompt(&params.name)
                    .await
                    .ok_or_else(|| ServerError::PromptNotFound(params.name.clone()))?;
                let result: GetPromptResult = handler.get(&ctx, params.arguments).await?;
                serde_json::to_value(result).map_err(|e| ServerError::InternalError(e.to_string()))
            }

            methods::RESOURCES_LIST => {
                let resources = catalog.all_resources().await;
                serde_json::to_value(ListResourcesResult { resources, next_cursor: None })
                    .map_err(|e| ServerError::InternalError(e.to_string()))
            }

            methods::RESOURCES_TEMPLATES_LIST => {
                let resource_templates = catalog.all_resource_templates().await;
                serde_json::to_value(ListResourceTemplatesResult { resource_templates, next_cursor: None })
                    .map_err(|e| ServerError::InternalError(e.to_string()))
            }

            methods::RESOURCES_READ => {
                let params: ReadResourceParams = decode_params(request.params)?;
                let (_, handler) = catalog
                    .get_resource(&params.uri)
                    .await
                    .ok_or_else(|| ServerError::ResourceNotFound(params.uri.clone()))?;
                let result: ReadResourceResult = handler.read(&ctx, &params.uri).await?;
                serde_json::to_value(result).map_err(|e| ServerError::InternalError(e.to_string()))
            }

            methods::RESOURCES_SUBSCRIBE | methods::RESOURCES_UNSUBSCRIBE => Ok(Value::Null),

            methods::LOGGING_SET_LEVEL => Ok(Value::Null),

            methods::COMPLETION_COMPLETE => {
                let _params: CompleteParams = decode_params(request.params)?;
                serde_json::to_value(CompleteResult::default())
                    .map_err(|e| ServerError::InternalError(e.to_string()))
            }

            other => Err(ServerError::MethodNotFound(other.to_string())),
        }
    }

    async fn handle_notification(&self, session_id: &str, notification: JsonRpcNotification) {
        if notification.method == crate::protocol::notifications::INITIALIZED {
            if let Some(session) = self.sessions.get(session_id) {
                session.set_state(SessionState::Initialized).await;
                debug!(session_id, "session initialized");
            }
            return;
        }

        let ctx = RequestContext::new(session_id);
        let listeners = self.catalog.notification_listeners_for(&notification.method).await;
        for listener in listeners {
            listener
                .on_notification(&ctx, &notification.method, notification.params.clone())
                .await;
        }
    }
}

fn decode_params<T: serde::de::DeserializeOwned>(params: Option<Value>) -> ServerResult<T> {
    let value = params.ok_or_else(|| ServerError::InvalidParams("missing params".to_string()))?;
    serde_json::from_value(value).map_err(|e| ServerError::InvalidParams(e.to_string()))
}

impl ServerError {
    fn to_error_object(&self) -> JsonRpcErrorObject {
        JsonRpcErrorObject::new(self.error_code(), self.to_string())
    }
}

#[async_trait]
impl RequestProcessor for ServerCore {
    async fn process(&self, session_id: Option<String>, frame: Frame) -> Option<Frame> {
        let session_id = session_id.unwrap_or_else(|| "default".to_string());
        self.handle(&session_id, frame).await
    }
}

/// Assembles capabilities, initial catalog entries, and hooks before
/// construction (SPEC_FULL.md §4.4 supplement, mirroring the teacher's
/// `McpServerBuilder`).
pub struct ServerCoreBuilder {
    config: ServerConfig,
    hooks: Hooks,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl ServerCoreBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            hooks: Hooks::default(),
            middleware: Vec::new(),
        }
    }

    pub fn server_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.config.server_info = ServerInfo { name: name.into(), version: version.into() };
        self
    }

    pub fn capabilities(mut self, capabilities: ServerCapabilities) -> Self {
        self.config.capabilities = capabilities;
        self
    }

    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.config.instructions = Some(instructions.into());
        self
    }

    pub fn hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> ServerCore {
        ServerCore {
            config: self.config,
            catalog: Arc::new(ServerCatalog::new(self.hooks, self.middleware)),
            sessions: Arc::new(SessionRegistry::new()),
        }
    }
}

impl Default for ServerCoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}
