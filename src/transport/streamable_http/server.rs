//! Server side of the single-endpoint Streamable-HTTP transport.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::protocol::{error_codes, methods, Frame};
use crate::transport::streamable_http::config::StreamableHttpConfig;
use crate::transport::streamable_http::SESSION_HEADER;
use crate::transport::{json_rpc_error_body, RequestProcessor, TransportError, TransportResult};

struct ServerState {
    config: StreamableHttpConfig,
    processor: Arc<dyn RequestProcessor>,
}

/// One axum route handles every frame; session identity rides the
/// `Mcp-Session-Id` header rather than the URL.
pub struct StreamableHttpServerTransport {
    state: Arc<ServerState>,
}

impl StreamableHttpServerTransport {
    pub fn new(config: StreamableHttpConfig, processor: Arc<dyn RequestProcessor>) -> Self {
        Self {
            state: Arc::new(ServerState { config, processor }),
        }
    }

    pub fn router(&self) -> Router {
        let path = self.state.config.endpoint_path.clone();
        Router::new()
            .route(&path, post(handle_post))
            .with_state(Arc::clone(&self.state))
    }

    pub async fn serve(&self) -> TransportResult<()> {
        let listener = tokio::net::TcpListener::bind(&self.state.config.bind_addr)
            .await
            .map_err(TransportError::Io)?;
        debug!(addr = %self.state.config.bind_addr, "streamable-http server transport listening");
        axum::serve(listener, self.router())
            .await
            .map_err(|e| TransportError::Other(e.to_string()))?;
        Ok(())
    }
}

fn json_rpc_error_response(status: StatusCode, code: i32, message: impl Into<String>) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        json_rpc_error_body(code, message),
    )
        .into_response()
}

async fn handle_post(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let frame = match Frame::decode(&body) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "rejecting malformed streamable-http body");
            return json_rpc_error_response(StatusCode::BAD_REQUEST, error_codes::PARSE_ERROR, e.to_string());
        }
    };

    let is_initialize = matches!(&frame, Frame::Request(r) if r.method == methods::INITIALIZE);
    let session_id = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| is_initialize.then(|| Uuid::new_v4().to_string()));

    let response_frame = state.processor.process(session_id.clone(), frame).await;

    let Some(response_frame) = response_frame else {
        return StatusCode::ACCEPTED.into_response();
    };

    let payload = match response_frame.encode() {
        Ok(payload) => payload,
        Err(e) => {
            return json_rpc_error_response(StatusCode::INTERNAL_SERVER_ERROR, error_codes::INTERNAL_ERROR, e.to_string())
        }
    };

    let mut response = if state.config.prefer_sse_responses {
        let sse_body = format!("event: message\ndata: {payload}\n\n");
        (
            [(axum::http::header::CONTENT_TYPE, "text/event-stream")],
            sse_body,
        )
            .into_response()
    } else {
        (
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            payload,
        )
            .into_response()
    };

    if is_initialize {
        if let Some(sid) = session_id {
            if let Ok(value) = HeaderValue::from_str(&sid) {
                response.headers_mut().insert(SESSION_HEADER, value);
            }
        }
    }

    response
}
