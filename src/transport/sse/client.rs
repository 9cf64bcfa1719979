//! Client-side SSE transport: opens `GET <sse_url>`, waits for the
//! `endpoint` event, then posts subsequent frames to it (spec.md §4.6.3).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::{oneshot, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::protocol::Frame;
use crate::transport::sse::parser::IncrementalSseParser;
use crate::transport::{FrameHandler, Transport, TransportError, TransportResult};

#[derive(Clone)]
pub struct SseClientConfig {
    pub sse_url: String,
}

/// Speaks the asymmetric SSE protocol: a long-lived GET stream for inbound
/// frames, short-lived POSTs for outbound ones.
pub struct SseClientTransport {
    config: SseClientConfig,
    http: reqwest::Client,
    endpoint: Arc<RwLock<Option<String>>>,
    handler: Option<Arc<dyn FrameHandler>>,
    connected: Arc<AtomicBool>,
    reader_task: Option<JoinHandle<()>>,
}

impl SseClientTransport {
    pub fn new(config: SseClientConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            endpoint: Arc::new(RwLock::new(None)),
            handler: None,
            connected: Arc::new(AtomicBool::new(false)),
            reader_task: None,
        }
    }
}

#[async_trait]
impl Transport for SseClientTransport {
    async fn start(&mut self) -> TransportResult<()> {
        let response = self
            .http
            .get(&self.config.sse_url)
            .header("Accept", "text/event-stream")
            .send()
            .await
            .map_err(|e| TransportError::ReadFailed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(TransportError::HttpStatus(response.status().as_u16()));
        }

        let (endpoint_tx, endpoint_rx) = oneshot::channel::<String>();
        let mut endpoint_tx = Some(endpoint_tx);

        let handler = self.handler.clone();
        let endpoint_slot = Arc::clone(&self.endpoint);
        let connected = Arc::clone(&self.connected);
        connected.store(true, Ordering::SeqCst);

        self.reader_task = Some(tokio::spawn(async move {
            let mut body = response.bytes_stream();
            let mut parser = IncrementalSseParser::new();
            while let Some(chunk) = body.next().await {
                let chunk = match chunk {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        if let Some(handler) = &handler {
                            handler
                                .handle_error(TransportError::ReadFailed(e.to_string()))
                                .await;
                        }
                        break;
                    }
                };
                let text = String::from_utf8_lossy(&chunk).into_owned();
                for event in parser.push(&text) {
                    match event.event.as_deref() {
                        Some("endpoint") => {
                            *endpoint_slot.write().await = Some(event.data.clone());
                            if let Some(tx) = endpoint_tx.take() {
                                let _ = tx.send(event.data);
                            }
                        }
                        Some("message") | None => {
                            if event.data.is_empty() {
                                continue;
                            }
                            match Frame::decode(event.data.as_bytes()) {
                                Ok(frame) => {
                                    if let Some(handler) = &handler {
                                        handler.handle_frame(frame).await;
                                    }
                                }
                                Err(e) => warn!(error = %e, "dropping unparseable sse message"),
                            }
                        }
                        Some(other) => debug!(event = %other, "ignoring unrecognized sse event"),
                    }
                }
            }
            connected.store(false, Ordering::SeqCst);
            if let Some(handler) = &handler {
                handler.handle_close().await;
            }
        }));

        // Block start() until the endpoint event arrives so the first send()
        // after start() always has somewhere to POST to.
        match endpoint_rx.await {
            Ok(_) => Ok(()),
            Err(_) => Err(TransportError::Disconnected),
        }
    }

    async fn send(&self, frame: &Frame) -> TransportResult<()> {
        let endpoint = self
            .endpoint
            .read()
            .await
            .clone()
            .ok_or(TransportError::NotConnected)?;
        let url = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint
        } else {
            let base = self
                .config
                .sse_url
                .rsplit_once('/')
                .map(|(base, _)| base)
                .unwrap_or(&self.config.sse_url);
            format!("{base}{endpoint}")
        };

        let body = frame.encode()?;
        let response = self
            .http
            .post(&url)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| TransportError::WriteFailed(e.to_string()))?;

        // Canonical success is 202 Accepted; 200 OK is accepted for
        // compatibility per spec.md §9's open-question resolution.
        if response.status().as_u16() == 202 || response.status().is_success() {
            Ok(())
        } else {
            Err(TransportError::HttpStatus(response.status().as_u16()))
        }
    }

    fn set_frame_handler(&mut self, handler: Arc<dyn FrameHandler>) {
        self.handler = Some(handler);
    }

    async fn close(&mut self) -> TransportResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
        Ok(())
    }

    fn session_id(&self) -> Option<String> {
        None
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn transport_type(&self) -> &'static str {
        "sse"
    }
}
