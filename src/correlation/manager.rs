//! The correlator: matches inbound responses to parked outbound requests,
//! fans notifications out to a single registered handler, and allocates
//! request ids (spec.md §4.2). Grounded on the teacher's
//! `correlation::manager::CorrelationManager`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::correlation::config::CorrelationConfig;
use crate::correlation::error::{CorrelationError, CorrelationResult};
use crate::correlation::types::{PendingCall, RequestIdGenerator, RpcOutcome};
use crate::protocol::{Frame, JsonRpcNotification, JsonRpcRequest, RequestId};
use crate::transport::{FrameHandler, Transport, TransportError};

/// A registered notification callback. At most one is active at a time
/// (spec.md §4.2: "at-most-one handler; subsequent registrations replace
/// the previous").
pub type NotificationHandler = Arc<dyn Fn(JsonRpcNotification) + Send + Sync>;

/// Sits between `ClientCore` and a `Transport`. Owns request-id allocation,
/// the pending-call table, and the single notification dispatch task.
pub struct Correlator<T: Transport + 'static> {
    transport: RwLock<T>,
    pending: DashMap<RequestId, PendingCall>,
    id_gen: RequestIdGenerator,
    config: CorrelationConfig,
    closed: AtomicBool,
    notification_handler: RwLock<Option<NotificationHandler>>,
    notification_tx: mpsc::UnboundedSender<JsonRpcNotification>,
    cleanup_handle: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl<T: Transport + 'static> Correlator<T> {
    /// Builds a correlator around an already-constructed transport. Does not
    /// start the transport or the background cleanup task; call
    /// [`Correlator::start`] for that.
    pub fn new(transport: T, config: CorrelationConfig) -> Arc<Self> {
        let (notification_tx, mut notification_rx) = mpsc::unbounded_channel::<JsonRpcNotification>();

        let correlator = Arc::new(Self {
            transport: RwLock::new(transport),
            pending: DashMap::new(),
            id_gen: RequestIdGenerator::new(),
            config,
            closed: AtomicBool::new(false),
            notification_handler: RwLock::new(None),
            notification_tx,
            cleanup_handle: std::sync::Mutex::new(None),
        });

        // Single dispatch task: notifications are delivered strictly in
        // arrival order regardless of how many transport readers feed them.
        let dispatch_target = Arc::clone(&correlator);
        tokio::spawn(async move {
            while let Some(notification) = notification_rx.recv().await {
                let handler = dispatch_target.notification_handler.read().await.clone();
                if let Some(handler) = handler {
                    handler(notification);
                } else {
                    trace!(method = %notification.method, "dropping notification, no handler registered");
                }
            }
        });

        correlator
    }

    /// Starts the underlying transport and the periodic stale-pending sweep.
    pub async fn start(self: &Arc<Self>) -> CorrelationResult<()> {
        {
            let mut transport = self.transport.write().await;
            transport.set_frame_handler(Arc::clone(self) as Arc<dyn FrameHandler>);
            transport
                .start()
                .await
                .map_err(|e| CorrelationError::TransportError {
                    id: RequestId::new_number(0),
                    message: e.to_string(),
                })?;
        }

        let weak = Arc::downgrade(self);
        let interval = self.config.cleanup_interval;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let Some(correlator) = weak.upgrade() else {
                    break;
                };
                correlator.sweep_stale();
            }
        });
        *self.cleanup_handle.lock().unwrap_or_else(|p| p.into_inner()) = Some(handle);
        Ok(())
    }

    fn sweep_stale(&self) {
        let timeout = std::time::Duration::from_millis(
            self.config.default_timeout.num_milliseconds().max(0) as u64,
        );
        let stale: Vec<RequestId> = self
            .pending
            .iter()
            .filter(|entry| entry.value().created_at.elapsed() >= timeout)
            .map(|entry| entry.key().clone())
            .collect();
        for id in stale {
            if let Some((id, call)) = self.pending.remove(&id) {
                if self.config.enable_tracing {
                    warn!(%id, "request timed out while parked");
                }
                let _ = call.sender.send(Err(CorrelationError::Timeout { id }));
            }
        }
    }

    /// Sends `method`/`params` as a Request, parks the caller, and awaits
    /// the matching Response, cancellation, or transport disconnect.
    pub async fn send_request(
        self: &Arc<Self>,
        method: impl Into<String>,
        params: Option<serde_json::Value>,
        ctx: CancellationToken,
    ) -> CorrelationResult<RpcOutcome> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CorrelationError::Disconnected {
                id: RequestId::new_number(0),
            });
        }
        if self.pending.len() >= self.config.max_pending_requests {
            return Err(CorrelationError::CapacityExceeded);
        }

        let id = self.id_gen.next_id();
        let request = JsonRpcRequest::new(method.into(), params, id.clone());
        let (pending_call, receiver) = PendingCall::new();
        self.pending.insert(id.clone(), pending_call);

        if self.config.enable_tracing {
            debug!(%id, method = %request.method, "sending request");
        }

        if let Err(e) = self
            .transport
            .read()
            .await
            .send(&Frame::Request(request))
            .await
        {
            self.pending.remove(&id);
            return Err(CorrelationError::TransportError {
                id,
                message: e.to_string(),
            });
        }

        tokio::select! {
            result = receiver => {
                match result {
                    Ok(inner) => inner,
                    Err(_recv_error) => {
                        self.pending.remove(&id);
                        Err(CorrelationError::Disconnected { id })
                    }
                }
            }
            _ = ctx.cancelled() => {
                self.pending.remove(&id);
                Err(CorrelationError::Cancelled { id })
            }
        }
    }

    /// Fire-and-forget Notification send.
    pub async fn send_notification(
        &self,
        method: impl Into<String>,
        params: Option<serde_json::Value>,
    ) -> CorrelationResult<()> {
        let notification = JsonRpcNotification::new(method.into(), params);
        self.transport
            .read()
            .await
            .send(&Frame::Notification(notification))
            .await
            .map_err(|e| CorrelationError::TransportError {
                id: RequestId::new_number(0),
                message: e.to_string(),
            })
    }

    /// Registers the single notification handler, replacing any prior one.
    pub async fn on_notification(&self, handler: NotificationHandler) {
        *self.notification_handler.write().await = Some(handler);
    }

    /// Idempotent. Completes all outstanding parks with `Disconnected`,
    /// drops the notification handler, and closes the transport.
    pub async fn close(self: &Arc<Self>) -> CorrelationResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(handle) = self.cleanup_handle.lock().unwrap_or_else(|p| p.into_inner()).take() {
            handle.abort();
        }
        for entry in self.pending.iter() {
            // Collect separately; DashMap iteration holds shard locks.
            let _ = entry;
        }
        let ids: Vec<RequestId> = self.pending.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            if let Some((id, call)) = self.pending.remove(&id) {
                let _ = call.sender.send(Err(CorrelationError::Disconnected { id }));
            }
        }
        *self.notification_handler.write().await = None;
        self.transport
            .write()
            .await
            .close()
            .await
            .map_err(|e| CorrelationError::TransportError {
                id: RequestId::new_number(0),
                message: e.to_string(),
            })
    }
}

/// The correlator is the transport's event sink on the client side: inbound
/// Responses resolve parked calls, inbound Notifications are queued onto the
/// single dispatch task, and stray inbound Requests (a server-initiated call
/// to the client) are logged and dropped — this crate's `ClientCore` does not
/// service server-initiated requests.
#[async_trait]
impl<T: Transport + 'static> FrameHandler for Correlator<T> {
    async fn handle_frame(&self, frame: Frame) {
        match frame {
            Frame::Response(response) => {
                let Some(id) = response.id.clone() else {
                    warn!("dropping response with no id");
                    return;
                };
                if let Some((_, call)) = self.pending.remove(&id) {
                    let outcome: RpcOutcome = match (response.result, response.error) {
                        (Some(result), None) => Ok(result),
                        (None, Some(error)) => Err(error),
                        _ => Ok(serde_json::Value::Null),
                    };
                    let _ = call.sender.send(Ok(outcome));
                } else {
                    trace!(%id, "dropping response for unknown or already-resolved request");
                }
            }
            Frame::Notification(notification) => {
                let _ = self.notification_tx.send(notification);
            }
            Frame::Request(request) => {
                warn!(method = %request.method, "dropping unsupported server-initiated request");
            }
        }
    }

    async fn handle_error(&self, error: TransportError) {
        warn!(%error, "transport error; failing all pending requests");
        let ids: Vec<RequestId> = self.pending.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            if let Some((id, call)) = self.pending.remove(&id) {
                let failure = match &error {
                    TransportError::ProcessExited { status } => {
                        CorrelationError::ProcessExited { id, status: status.clone() }
                    }
                    _ => CorrelationError::Disconnected { id },
                };
                let _ = call.sender.send(Err(failure));
            }
        }
    }

    async fn handle_close(&self) {
        debug!("transport closed");
        self.closed.store(true, Ordering::SeqCst);
        let ids: Vec<RequestId> = self.pending.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            if let Some((id, call)) = self.pending.remove(&id) {
                let _ = call.sender.send(Err(CorrelationError::Disconnected { id }));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::in_process::InProcessTransport;

    fn test_config() -> CorrelationConfig {
        CorrelationConfig {
            default_timeout: chrono::TimeDelta::milliseconds(200),
            cleanup_interval: std::time::Duration::from_millis(20),
            max_pending_requests: 4,
            enable_tracing: false,
        }
    }

    #[tokio::test]
    async fn send_request_times_out_when_nobody_answers() {
        let (client_side, _server_side) = InProcessTransport::pair();
        let correlator = Correlator::new(client_side, test_config());
        correlator.start().await.unwrap();

        let result = correlator
            .send_request("debug/echo", None, CancellationToken::new())
            .await;
        assert!(matches!(result, Err(CorrelationError::Timeout { .. })));
    }

    #[tokio::test]
    async fn send_request_is_cancelled_by_ctx() {
        let (client_side, _server_side) = InProcessTransport::pair();
        let correlator = Correlator::new(client_side, test_config());
        correlator.start().await.unwrap();

        let ctx = CancellationToken::new();
        let ctx_clone = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            ctx_clone.cancel();
        });

        let result = correlator.send_request("slow/op", None, ctx).await;
        assert!(matches!(result, Err(CorrelationError::Cancelled { .. })));
    }

    #[tokio::test]
    async fn capacity_exceeded_rejects_new_requests() {
        let (client_side, _server_side) = InProcessTransport::pair();
        let correlator = Correlator::new(client_side, test_config());
        correlator.start().await.unwrap();

        for _ in 0..4 {
            let correlator = Arc::clone(&correlator);
            tokio::spawn(async move {
                let _ = correlator
                    .send_request("debug/echo", None, CancellationToken::new())
                    .await;
            });
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        let result = correlator
            .send_request("debug/echo", None, CancellationToken::new())
            .await;
        assert!(matches!(result, Err(CorrelationError::CapacityExceeded)));
    }
}
