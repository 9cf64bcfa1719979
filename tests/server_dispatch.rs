//! Exercises `ServerCore::handle` directly, without a transport in the loop:
//! capability gating, the initialize state machine, session-local tool
//! overrides, and notification back-pressure.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use mcp_runtime::protocol::{
    CallToolParams, CallToolResult, ClientCapabilities, ClientInfo, Content, Frame,
    InitializeParams, JsonRpcRequest, ProtocolVersion, RequestId, ServerCapabilities, Tool,
    ToolCapabilities,
};
use mcp_runtime::server::{Session, SessionRegistry, SessionState, ToolHandler};
use mcp_runtime::{
    HookContext, Hooks, RequestContext, ServerConfig, ServerCoreBuilder, ServerError, ServerResult,
};

struct FixedTool(&'static str);

#[async_trait]
impl ToolHandler for FixedTool {
    async fn call(&self, _ctx: &RequestContext, _arguments: Value) -> ServerResult<CallToolResult> {
        Ok(CallToolResult::success(vec![Content::text(self.0)]))
    }
}

fn tool_capable_capabilities() -> ServerCapabilities {
    ServerCapabilities {
        tools: Some(ToolCapabilities::default()),
        ..Default::default()
    }
}

fn call_tool_request(name: &str, id: i64) -> Frame {
    let params = CallToolParams { name: name.to_string(), arguments: Value::Null };
    Frame::Request(JsonRpcRequest::new(
        "tools/call",
        Some(serde_json::to_value(params).unwrap()),
        RequestId::new_number(id),
    ))
}

fn tool_text(frame: Frame) -> String {
    let Frame::Response(response) = frame else {
        panic!("expected a response frame");
    };
    let result: CallToolResult = serde_json::from_value(response.result.unwrap()).unwrap();
    let Content::Text { text } = &result.content[0] else {
        panic!("expected text content");
    };
    text.clone()
}

#[tokio::test]
async fn session_local_tool_shadows_the_global_one() {
    let server = ServerCoreBuilder::new()
        .capabilities(tool_capable_capabilities())
        .build();

    server
        .add_tool(
            Tool { name: "test_tool".into(), description: None, input_schema: json!({}) },
            Arc::new(FixedTool("global result")),
        )
        .await;

    server.connect_session("session-a").unwrap();
    server
        .add_session_tool(
            "session-a",
            Tool { name: "test_tool".into(), description: None, input_schema: json!({}) },
            Arc::new(FixedTool("session result")),
        )
        .await
        .unwrap();

    let from_override = server
        .handle("session-a", call_tool_request("test_tool", 1))
        .await
        .unwrap();
    assert_eq!(tool_text(from_override), "session result");

    // Any other session (auto-registered on first contact) still sees the
    // global tool.
    let from_global = server
        .handle("session-b", call_tool_request("test_tool", 2))
        .await
        .unwrap();
    assert_eq!(tool_text(from_global), "global result");
}

#[tokio::test]
async fn ungated_capability_reports_method_not_found() {
    // `capabilities.tools` left `None`: the whole `tools/` family is gated
    // off rather than reachable-but-empty.
    let server = ServerCoreBuilder::new().build();

    let response = server
        .handle("session-a", call_tool_request("whatever", 1))
        .await
        .unwrap();
    let Frame::Response(response) = response else { panic!("expected a response frame") };
    let error = response.error.expect("gated method must fail");
    assert_eq!(error.code, mcp_runtime::protocol::error_codes::METHOD_NOT_FOUND);
}

#[tokio::test]
async fn initialize_is_rejected_the_second_time() {
    let server = ServerCoreBuilder::new().build();
    let params = InitializeParams {
        protocol_version: ProtocolVersion::current(),
        capabilities: ClientCapabilities::default(),
        client_info: ClientInfo { name: "test-client".into(), version: "1.0.0".into() },
    };
    let request = |id| {
        Frame::Request(JsonRpcRequest::new(
            "initialize",
            Some(serde_json::to_value(&params).unwrap()),
            RequestId::new_number(id),
        ))
    };

    let first = server.handle("session-a", request(1)).await.unwrap();
    let Frame::Response(first) = first else { panic!("expected a response frame") };
    assert!(first.error.is_none());

    let second = server.handle("session-a", request(2)).await.unwrap();
    let Frame::Response(second) = second else { panic!("expected a response frame") };
    assert!(second.error.is_some());
}

#[tokio::test]
async fn blocked_notification_sink_fails_without_unregistering_the_session() {
    let (session, _rx) = Session::new("s1", 1);
    session.set_state(SessionState::Initialized).await;
    let registry = SessionRegistry::new();
    registry.register(Arc::clone(&session)).unwrap();

    assert!(registry.send_to("s1", "notifications/test", None).await.is_ok());
    let second = registry.send_to("s1", "notifications/test", None).await;
    assert!(matches!(second, Err(ServerError::ChannelBlocked)));

    // The blocked sink doesn't take the session down.
    assert!(registry.get("s1").is_some());
}

#[tokio::test]
async fn blocked_broadcast_reaches_the_on_error_hook() {
    let observed: Arc<Mutex<Vec<(String, String)>>> = Arc::new(Mutex::new(Vec::new()));
    let observed_in_hook = Arc::clone(&observed);

    let mut hooks = Hooks::default();
    hooks.on_error.push(Arc::new(move |ctx: &HookContext, err: &ServerError| {
        observed_in_hook
            .lock()
            .unwrap()
            .push((ctx.session_id.clone(), ctx.method.clone()));
        assert!(matches!(err, ServerError::ChannelBlocked));
    }));

    let server = ServerCoreBuilder::new()
        .capabilities(tool_capable_capabilities())
        .hooks(hooks)
        .config(ServerConfig { notification_sink_capacity: 1, ..Default::default() })
        .build();

    server.connect_session("session-a").unwrap();
    // `add_tool` broadcasts `notifications/tools/list_changed`; the session's
    // sink (capacity 1) isn't drained, so the second add blocks it.
    server
        .add_tool(
            Tool { name: "first".into(), description: None, input_schema: json!({}) },
            Arc::new(FixedTool("first")),
        )
        .await;

    // The first broadcast lands before the session reaches `Initialized`, so
    // it isn't delivered at all; bring the session up before filling the sink.
    let init_params = InitializeParams {
        protocol_version: ProtocolVersion::current(),
        capabilities: ClientCapabilities::default(),
        client_info: ClientInfo { name: "test-client".into(), version: "1.0.0".into() },
    };
    let init_request = Frame::Request(JsonRpcRequest::new(
        "initialize",
        Some(serde_json::to_value(&init_params).unwrap()),
        RequestId::new_number(1),
    ));
    server.handle("session-a", init_request).await.unwrap();

    server
        .add_tool(
            Tool { name: "second".into(), description: None, input_schema: json!({}) },
            Arc::new(FixedTool("second")),
        )
        .await;
    server
        .add_tool(
            Tool { name: "third".into(), description: None, input_schema: json!({}) },
            Arc::new(FixedTool("third")),
        )
        .await;

    let fired = observed.lock().unwrap().clone();
    assert_eq!(fired, vec![("session-a".to_string(), "notifications/tools/list_changed".to_string())]);
}
