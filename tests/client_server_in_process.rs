//! Drives a real `ClientCore` against a real `ServerCore` over a paired
//! `InProcessTransport`, exercising the full request/response round trip
//! rather than either side in isolation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use mcp_runtime::protocol::{CallToolResult, Content, ServerCapabilities, Tool, ToolCapabilities};
use mcp_runtime::server::ToolHandler;
use mcp_runtime::transport::in_process::InProcessTransport;
use mcp_runtime::transport::{FrameHandler, Transport, TransportError};
use mcp_runtime::{ClientCoreBuilder, ClientError, CorrelationError, RequestContext, ServerCoreBuilder, ServerResult};

struct EchoTool;

#[async_trait]
impl ToolHandler for EchoTool {
    async fn call(&self, _ctx: &RequestContext, arguments: Value) -> ServerResult<CallToolResult> {
        Ok(CallToolResult::success(vec![Content::text(arguments.to_string())]))
    }
}

struct SlowTool(Duration);

#[async_trait]
impl ToolHandler for SlowTool {
    async fn call(&self, _ctx: &RequestContext, _arguments: Value) -> ServerResult<CallToolResult> {
        tokio::time::sleep(self.0).await;
        Ok(CallToolResult::success(vec![Content::text("done")]))
    }
}

/// Feeds inbound frames from the server-side `InProcessTransport` into a
/// `ServerCore`, writing any response back out the same transport. Each
/// frame is handled on its own task so one slow call can't hold up another.
struct ServerBridge {
    server: Arc<mcp_runtime::ServerCore>,
    transport: Arc<Mutex<InProcessTransport>>,
}

#[async_trait]
impl FrameHandler for ServerBridge {
    async fn handle_frame(&self, frame: mcp_runtime::Frame) {
        let server = Arc::clone(&self.server);
        let transport = Arc::clone(&self.transport);
        tokio::spawn(async move {
            if let Some(response) = server.handle("default", frame).await {
                let _ = transport.lock().await.send(&response).await;
            }
        });
    }
    async fn handle_error(&self, _error: TransportError) {}
    async fn handle_close(&self) {}
}

async fn connected_client() -> Arc<mcp_runtime::ClientCore<InProcessTransport>> {
    let server = Arc::new(
        ServerCoreBuilder::new()
            .server_info("mock-server", "1.0.0")
            .capabilities(ServerCapabilities {
                tools: Some(ToolCapabilities::default()),
                ..Default::default()
            })
            .build(),
    );
    server
        .add_tool(
            Tool { name: "echo".into(), description: None, input_schema: json!({}) },
            Arc::new(EchoTool),
        )
        .await;
    server
        .add_tool(
            Tool { name: "slow".into(), description: None, input_schema: json!({}) },
            Arc::new(SlowTool(Duration::from_millis(300))),
        )
        .await;

    let (client_side, server_side) = InProcessTransport::pair();
    let server_side = Arc::new(Mutex::new(server_side));
    let bridge = Arc::new(ServerBridge { server, transport: Arc::clone(&server_side) });
    server_side.lock().await.set_frame_handler(bridge);
    server_side.lock().await.start().await.unwrap();

    let client = ClientCoreBuilder::new()
        .client_info("test-client", "1.0.0")
        .build(client_side);
    client.start().await.unwrap();
    client.initialize(CancellationToken::new()).await.unwrap();
    client
}

#[tokio::test]
async fn initialize_handshake_reports_server_identity() {
    let server = Arc::new(ServerCoreBuilder::new().server_info("mock-server", "1.0.0").build());
    let (client_side, server_side) = InProcessTransport::pair();
    let server_side = Arc::new(Mutex::new(server_side));
    let bridge = Arc::new(ServerBridge { server, transport: Arc::clone(&server_side) });
    server_side.lock().await.set_frame_handler(bridge);
    server_side.lock().await.start().await.unwrap();

    let client = ClientCoreBuilder::new().client_info("test-client", "1.0.0").build(client_side);
    client.start().await.unwrap();

    let result = client.initialize(CancellationToken::new()).await.unwrap();
    assert_eq!(result.server_info.name, "mock-server");
    assert!(client.is_initialized());
}

#[tokio::test]
async fn echo_tool_round_trips_its_arguments() {
    let client = connected_client().await;

    let result = client
        .call_tool(
            CancellationToken::new(),
            "echo",
            json!({"string": "hello world", "array": [1, 2, 3]}),
        )
        .await
        .unwrap();

    let Content::Text { text } = &result.content[0] else { panic!("expected text content") };
    let echoed: Value = serde_json::from_str(text).unwrap();
    assert_eq!(echoed["string"], "hello world");
    assert_eq!(echoed["array"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn five_concurrent_calls_each_get_their_own_response() {
    let client = connected_client().await;

    let calls = (0..5).map(|i| {
        let client = Arc::clone(&client);
        tokio::spawn(async move {
            let result = client
                .call_tool(CancellationToken::new(), "echo", json!({"requestIndex": i}))
                .await
                .unwrap();
            let Content::Text { text } = &result.content[0] else { panic!("expected text content") };
            let echoed: Value = serde_json::from_str(text).unwrap();
            assert_eq!(echoed["requestIndex"], i);
        })
    });

    for call in calls {
        call.await.unwrap();
    }
}

#[tokio::test]
async fn cancellation_returns_promptly_without_waiting_for_the_slow_handler() {
    let client = connected_client().await;

    let ctx = CancellationToken::new();
    let ctx_clone = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        ctx_clone.cancel();
    });

    let started = Instant::now();
    let result = client.call_tool(ctx, "slow", Value::Null).await;
    let elapsed = started.elapsed();

    assert!(matches!(result, Err(ClientError::Correlation(CorrelationError::Cancelled { .. }))));
    assert!(elapsed < Duration::from_millis(200), "cancellation took {elapsed:?}");
}
