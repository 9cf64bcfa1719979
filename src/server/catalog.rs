//! The server's registry of tools, prompts, resources, and templates, plus
//! the hooks and middleware configured around them (spec.md §3
//! `ServerCatalog`).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::protocol::{notifications, Prompt, Resource, ResourceTemplate, Tool};
use crate::server::error::ServerError;
use crate::server::handlers::{
    NotificationListener, PromptHandler, ResourceHandler, ToolFilter, ToolHandler,
};
use crate::server::hooks::{HookContext, Hooks};
use crate::server::middleware::Middleware;
use crate::server::session::SessionRegistry;

type ToolEntry = (Tool, Arc<dyn ToolHandler>);
type PromptEntry = (Prompt, Arc<dyn PromptHandler>);
type ResourceEntry = (Resource, Arc<dyn ResourceHandler>);

/// Owned exclusively by `ServerCore` (spec.md §3 ownership rule). Every
/// mutation is serialized against itself and list-changed notifications are
/// emitted only after the mutation is visible (spec.md §5).
pub struct ServerCatalog {
    pub(crate) tools: RwLock<HashMap<String, ToolEntry>>,
    pub(crate) prompts: RwLock<HashMap<String, PromptEntry>>,
    pub(crate) resources: RwLock<HashMap<String, ResourceEntry>>,
    pub(crate) resource_templates: RwLock<HashMap<String, ResourceTemplate>>,
    pub(crate) notification_listeners: RwLock<HashMap<String, Vec<Arc<dyn NotificationListener>>>>,
    pub hooks: Hooks,
    pub middleware: Vec<Arc<dyn Middleware>>,
    pub tool_filter: RwLock<Option<ToolFilter>>,
}

impl ServerCatalog {
    pub fn new(hooks: Hooks, middleware: Vec<Arc<dyn Middleware>>) -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
            prompts: RwLock::new(HashMap::new()),
            resources: RwLock::new(HashMap::new()),
            resource_templates: RwLock::new(HashMap::new()),
            notification_listeners: RwLock::new(HashMap::new()),
            hooks,
            middleware,
            tool_filter: RwLock::new(None),
        }
    }

    /// Reports a single broadcast/send-to failure to the error hooks, the
    /// same path a failed request dispatch reports through (spec.md §5:
    /// "the error is reported to hooks").
    pub(crate) fn report_notify_failure(&self, session_id: &str, method: &str, error: &ServerError) {
        debug!(session_id, error = %error, "notification blocked");
        let ctx = HookContext { session_id: session_id.to_string(), method: method.to_string(), request_id: None };
        self.hooks.run_error(&ctx, error);
    }

    fn report_broadcast_failures(&self, method: &str, failures: Vec<(String, ServerError)>) {
        for (sid, err) in failures {
            self.report_notify_failure(&sid, method, &err);
        }
    }

    pub async fn add_tool(
        &self,
        sessions: &SessionRegistry,
        capability_enabled: bool,
        tool: Tool,
        handler: Arc<dyn ToolHandler>,
    ) {
        self.tools.write().await.insert(tool.name.clone(), (tool, handler));
        if capability_enabled {
            let failures = sessions.broadcast(notifications::TOOLS_LIST_CHANGED, None).await;
            self.report_broadcast_failures(notifications::TOOLS_LIST_CHANGED, failures);
        }
    }

    pub async fn delete_tools(&self, sessions: &SessionRegistry, capability_enabled: bool, names: &[String]) {
        {
            let mut guard = self.tools.write().await;
            for name in names {
                guard.remove(name);
            }
        }
        if capability_enabled {
            let failures = sessions.broadcast(notifications::TOOLS_LIST_CHANGED, None).await;
            self.report_broadcast_failures(notifications::TOOLS_LIST_CHANGED, failures);
        }
    }

    pub async fn add_resource(
        &self,
        sessions: &SessionRegistry,
        capability_enabled: bool,
        resource: Resource,
        handler: Arc<dyn ResourceHandler>,
    ) {
        self.resources
            .write()
            .await
            .insert(resource.uri.clone(), (resource, handler));
        if capability_enabled {
            let failures = sessions.broadcast(notifications::RESOURCES_LIST_CHANGED, None).await;
            self.report_broadcast_failures(notifications::RESOURCES_LIST_CHANGED, failures);
        }
    }

    pub async fn remove_resource(&self, sessions: &SessionRegistry, capability_enabled: bool, uri: &str) {
        self.resources.write().await.remove(uri);
        if capability_enabled {
            let failures = sessions.broadcast(notifications::RESOURCES_LIST_CHANGED, None).await;
            self.report_broadcast_failures(notifications::RESOURCES_LIST_CHANGED, failures);
        }
    }

    pub async fn add_resource_template(&self, template: ResourceTemplate) {
        self.resource_templates
            .write()
            .await
            .insert(template.uri_template.clone(), template);
    }

    pub async fn add_prompt(
        &self,
        sessions: &SessionRegistry,
        capability_enabled: bool,
        prompt: Prompt,
        handler: Arc<dyn PromptHandler>,
    ) {
        self.prompts.write().await.insert(prompt.name.clone(), (prompt, handler));
        if capability_enabled {
            let failures = sessions.broadcast(notifications::PROMPTS_LIST_CHANGED, None).await;
            self.report_broadcast_failures(notifications::PROMPTS_LIST_CHANGED, failures);
        }
    }

    pub async fn remove_prompt(&self, sessions: &SessionRegistry, capability_enabled: bool, name: &str) {
        self.prompts.write().await.remove(name);
        if capability_enabled {
            let failures = sessions.broadcast(notifications::PROMPTS_LIST_CHANGED, None).await;
            self.report_broadcast_failures(notifications::PROMPTS_LIST_CHANGED, failures);
        }
    }

    /// Multiple listeners allowed per method; invoked in registration order
    /// (spec.md §4.4).
    pub async fn add_notification_handler(&self, method: impl Into<String>, listener: Arc<dyn NotificationListener>) {
        self.notification_listeners
            .write()
            .await
            .entry(method.into())
            .or_default()
            .push(listener);
    }

    pub async fn notification_listeners_for(&self, method: &str) -> Vec<Arc<dyn NotificationListener>> {
        self.notification_listeners
            .read()
            .await
            .get(method)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn get_tool(&self, name: &str) -> Option<ToolEntry> {
        self.tools.read().await.get(name).cloned()
    }

    pub async fn all_tools(&self) -> Vec<Tool> {
        self.tools.read().await.values().map(|(tool, _)| tool.clone()).collect()
    }

    pub async fn get_prompt(&self, name: &str) -> Option<PromptEntry> {
        self.prompts.read().await.get(name).cloned()
    }

    pub async fn all_prompts(&self) -> Vec<Prompt> {
        self.prompts.read().await.values().map(|(p, _)| p.clone()).collect()
    }

    pub async fn get_resource(&self, uri: &str) -> Option<ResourceEntry> {
        self.resources.read().await.get(uri).cloned()
    }

    pub async fn all_resources(&self) -> Vec<Resource> {
        self.resources.read().await.values().map(|(r, _)| r.clone()).collect()
    }

    pub async fn all_resource_templates(&self) -> Vec<ResourceTemplate> {
        self.resource_templates.read().await.values().cloned().collect()
    }
}
