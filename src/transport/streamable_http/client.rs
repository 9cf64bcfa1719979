//! Client side of the Streamable-HTTP transport: every frame is its own
//! POST; session identity is echoed back via `Mcp-Session-Id`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::protocol::Frame;
use crate::transport::streamable_http::SESSION_HEADER;
use crate::transport::{FrameHandler, Transport, TransportError, TransportResult};

#[derive(Clone)]
pub struct StreamableHttpClientConfig {
    pub endpoint_url: String,
}

pub struct StreamableHttpClientTransport {
    config: StreamableHttpClientConfig,
    http: reqwest::Client,
    session_id: Arc<RwLock<Option<String>>>,
    handler: Option<Arc<dyn FrameHandler>>,
    connected: Arc<AtomicBool>,
}

impl StreamableHttpClientTransport {
    pub fn new(config: StreamableHttpClientConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            session_id: Arc::new(RwLock::new(None)),
            handler: None,
            connected: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl Transport for StreamableHttpClientTransport {
    async fn start(&mut self) -> TransportResult<()> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn send(&self, frame: &Frame) -> TransportResult<()> {
        let body = frame.encode()?;
        let mut request = self
            .http
            .post(&self.config.endpoint_url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json, text/event-stream")
            .body(body);

        if let Some(sid) = self.session_id.read().await.clone() {
            request = request.header(SESSION_HEADER, sid);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::WriteFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TransportError::HttpStatus(response.status().as_u16()));
        }

        if let Some(sid) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            *self.session_id.write().await = Some(sid.to_string());
        }

        if response.status() == reqwest::StatusCode::ACCEPTED {
            return Ok(());
        }

        let content_type = response
            .headers()
            .get(axum::http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::ReadFailed(e.to_string()))?;

        if content_type.starts_with("text/event-stream") {
            for event in crate::transport::sse::parse_events(&body) {
                if event.data.is_empty() {
                    continue;
                }
                let frame = Frame::decode(event.data.as_bytes())?;
                if let Some(handler) = &self.handler {
                    handler.handle_frame(frame).await;
                }
            }
        } else if !body.trim().is_empty() {
            let frame = Frame::decode(body.as_bytes())?;
            if let Some(handler) = &self.handler {
                handler.handle_frame(frame).await;
            }
        }

        Ok(())
    }

    fn set_frame_handler(&mut self, handler: Arc<dyn FrameHandler>) {
        self.handler = Some(handler);
    }

    async fn close(&mut self) -> TransportResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(handler) = &self.handler {
            handler.handle_close().await;
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
        "streamable-http"
    }
}
