//! Server-side SSE transport: `GET <base>/sse` opens a stream, `POST
//! <base>/message?sessionId=...` ingests frames (spec.md §4.6.3).

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use dashmap::DashMap;
use futures::stream::Stream;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::protocol::{error_codes, Frame};
use crate::transport::sse::config::SseServerConfig;
use crate::transport::{json_rpc_error_body, RequestProcessor, TransportResult};

struct SseServerState {
    config: SseServerConfig,
    processor: Arc<dyn RequestProcessor>,
    sessions: DashMap<String, mpsc::UnboundedSender<Frame>>,
}

/// Hosts the two SSE routes over axum. One instance serves every connected
/// session; session identity lives in the `sessionId` query parameter.
pub struct SseServerTransport {
    state: Arc<SseServerState>,
}

#[derive(Deserialize)]
struct MessageQuery {
    #[serde(rename = "sessionId")]
    session_id: String,
}

impl SseServerTransport {
    pub fn new(config: SseServerConfig, processor: Arc<dyn RequestProcessor>) -> Self {
        Self {
            state: Arc::new(SseServerState {
                config,
                processor,
                sessions: DashMap::new(),
            }),
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/sse", get(sse_stream_handler))
            .route("/message", post(message_handler))
            .with_state(Arc::clone(&self.state))
    }

    /// Binds `config.bind_addr` and serves until the process is signalled to
    /// stop. Intended for production use; tests typically build the
    /// `Router` directly and drive it with an in-memory client.
    pub async fn serve(&self) -> TransportResult<()> {
        let listener = tokio::net::TcpListener::bind(&self.state.config.bind_addr)
            .await
            .map_err(crate::transport::TransportError::Io)?;
        debug!(addr = %self.state.config.bind_addr, "sse server transport listening");
        axum::serve(listener, self.router())
            .await
            .map_err(|e| crate::transport::TransportError::Other(e.to_string()))?;
        Ok(())
    }

    fn endpoint_url(config: &SseServerConfig, session_id: &str) -> String {
        let path = format!("{}/message?sessionId={session_id}", config.base_path);
        if config.absolute_endpoint_url {
            let base = config.base_url.as_deref().unwrap_or("");
            format!("{base}{path}")
        } else {
            path
        }
    }
}

/// Removes its session from the registry when the SSE stream holding it is
/// dropped — the only reliable signal axum gives for a client disconnect.
struct SessionGuard {
    state: Arc<SseServerState>,
    session_id: String,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.state.sessions.remove(&self.session_id);
        debug!(session_id = %self.session_id, "sse session disconnected");
    }
}

async fn sse_stream_handler(
    State(state): State<Arc<SseServerState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let session_id = Uuid::new_v4().to_string();
    let (tx, rx) = mpsc::unbounded_channel::<Frame>();
    state.sessions.insert(session_id.clone(), tx);

    let endpoint = SseServerTransport::endpoint_url(&state.config, &session_id);
    let endpoint_event =
        futures::stream::once(
            async move { Ok(Event::default().event("endpoint").data(endpoint)) },
        );

    let guard = SessionGuard {
        state: Arc::clone(&state),
        session_id,
    };
    let frame_events = futures::stream::unfold(
        (UnboundedReceiverStream::new(rx), guard),
        |(mut rx, guard)| async move {
            let frame = rx.next().await?;
            let payload = frame.encode().unwrap_or_default();
            Some((
                Ok(Event::default().event("message").data(payload)),
                (rx, guard),
            ))
        },
    );

    let stream = endpoint_event.chain(frame_events);

    let mut sse = Sse::new(stream);
    if let Some(interval) = state.config.keep_alive_interval {
        sse = sse.keep_alive(KeepAlive::new().interval(interval).text("ping"));
    }
    sse
}

fn json_rpc_error_response(status: StatusCode, code: i32, message: impl Into<String>) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        json_rpc_error_body(code, message),
    )
        .into_response()
}

async fn message_handler(
    State(state): State<Arc<SseServerState>>,
    Query(query): Query<MessageQuery>,
    body: axum::body::Bytes,
) -> Response {
    let frame = match Frame::decode(&body) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "rejecting malformed sse message body");
            return json_rpc_error_response(StatusCode::BAD_REQUEST, error_codes::PARSE_ERROR, e.to_string());
        }
    };

    let Some(sender) = state.sessions.get(&query.session_id) else {
        return json_rpc_error_response(
            StatusCode::NOT_FOUND,
            error_codes::INTERNAL_ERROR,
            format!("unknown session {}", query.session_id),
        );
    };

    if let Some(response) = state
        .processor
        .process(Some(query.session_id.clone()), frame)
        .await
    {
        let _ = sender.send(response);
    }

    StatusCode::ACCEPTED.into_response()
}
