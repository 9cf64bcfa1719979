//! JSON-RPC 2.0 frame types: requests, responses, and notifications.
//!
//! A `Frame` is the tagged sum described in the data model: every inbound or
//! outbound message is exactly one of a request, a response, or a
//! notification, and the three never need a shared supertype beyond
//! `jsonrpc: "2.0"`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::ProtocolError;

/// Request identifier, preserving the JSON-RPC 2.0 string-or-number duality.
///
/// Ids are opaque beyond equality and display: the codec must preserve the
/// original representation (a numeric id must not round-trip as a string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    String(String),
    Number(i64),
}

impl RequestId {
    pub fn new_string(id: impl Into<String>) -> Self {
        RequestId::String(id.into())
    }

    pub fn new_number(id: i64) -> Self {
        RequestId::Number(id)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::String(s) => write!(f, "{s}"),
            RequestId::Number(n) => write!(f, "{n}"),
        }
    }
}

/// A JSON-RPC 2.0 request: a method invocation that expects a matching response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    pub id: RequestId,
}

impl JsonRpcRequest {
    pub fn new(method: impl Into<String>, params: Option<Value>, id: RequestId) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params,
            id,
        }
    }
}

/// A JSON-RPC 2.0 response: `result` XOR `error`, never both, never neither.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcErrorObject>,
    pub id: Option<RequestId>,
}

impl JsonRpcResponse {
    pub fn success(result: Value, id: RequestId) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id: Some(id),
        }
    }

    pub fn error(error: JsonRpcErrorObject, id: Option<RequestId>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }

    /// `true` if exactly one of `result`/`error` is present, per the invariant
    /// in spec.md §3 and §8.
    pub fn is_well_formed(&self) -> bool {
        self.result.is_some() ^ self.error.is_some()
    }
}

/// The JSON-RPC 2.0 error object embedded in an error `JsonRpcResponse`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcErrorObject {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcErrorObject {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// A JSON-RPC 2.0 notification: fire-and-forget, no id, no response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params,
        }
    }
}

/// The tagged union of the three frame kinds.
///
/// Decoding dispatches on the presence of `id`/`method` per spec.md §4.1:
/// `id` + `method` is a Request, `id` alone is a Response, `method` alone
/// (no `id`) is a Notification.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Request(JsonRpcRequest),
    Response(JsonRpcResponse),
    Notification(JsonRpcNotification),
}

impl Frame {
    pub fn encode(&self) -> Result<String, ProtocolError> {
        let value = match self {
            Frame::Request(r) => serde_json::to_string(r),
            Frame::Response(r) => serde_json::to_string(r),
            Frame::Notification(n) => serde_json::to_string(n),
        };
        value.map_err(ProtocolError::from)
    }

    /// Decode one frame from a JSON-RPC envelope.
    ///
    /// Rejects `jsonrpc != "2.0"` with `InvalidRequest`, and malformed JSON
    /// with `ParseError`. The id/method presence test happens against the
    /// raw `Value` before committing to a concrete struct, so a request with
    /// extra/missing fields reports the right error kind instead of a generic
    /// parse failure.
    pub fn decode(bytes: &[u8]) -> Result<Frame, ProtocolError> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| ProtocolError::ParseError(e.to_string()))?;

        let obj = value
            .as_object()
            .ok_or_else(|| ProtocolError::InvalidRequest("frame must be a JSON object".into()))?;

        match obj.get("jsonrpc").and_then(Value::as_str) {
            Some("2.0") => {}
            _ => {
                return Err(ProtocolError::InvalidRequest(
                    "jsonrpc field must be \"2.0\"".into(),
                ))
            }
        }

        let has_id = obj.contains_key("id");
        let has_method = obj.contains_key("method");

        if has_id && has_method {
            let req: JsonRpcRequest = serde_json::from_value(value)
                .map_err(|e| ProtocolError::InvalidRequest(e.to_string()))?;
            Ok(Frame::Request(req))
        } else if has_id {
            let resp: JsonRpcResponse = serde_json::from_value(value)
                .map_err(|e| ProtocolError::InvalidRequest(e.to_string()))?;
            if !resp.is_well_formed() {
                return Err(ProtocolError::InvalidRequest(
                    "response must carry exactly one of result/error".into(),
                ));
            }
            Ok(Frame::Response(resp))
        } else if has_method {
            let note: JsonRpcNotification = serde_json::from_value(value)
                .map_err(|e| ProtocolError::InvalidRequest(e.to_string()))?;
            Ok(Frame::Notification(note))
        } else {
            Err(ProtocolError::InvalidRequest(
                "frame has neither id nor method".into(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_round_trips_with_numeric_id() {
        let req = JsonRpcRequest::new("ping", None, RequestId::new_number(7));
        let frame = Frame::Request(req.clone());
        let encoded = frame.encode().unwrap();
        let decoded = Frame::decode(encoded.as_bytes()).unwrap();
        assert_eq!(decoded, Frame::Request(req));
    }

    #[test]
    fn request_round_trips_with_string_id() {
        let req = JsonRpcRequest::new(
            "tools/call",
            Some(json!({"name": "echo"})),
            RequestId::new_string("abc-123"),
        );
        let frame = Frame::Request(req.clone());
        let encoded = frame.encode().unwrap();
        let decoded = Frame::decode(encoded.as_bytes()).unwrap();
        assert_eq!(decoded, Frame::Request(req));
    }

    #[test]
    fn response_rejects_both_result_and_error() {
        let malformed = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": "ok",
            "error": {"code": -32000, "message": "oops"}
        });
        let bytes = serde_json::to_vec(&malformed).unwrap();
        assert!(Frame::decode(&bytes).is_err());
    }

    #[test]
    fn notification_has_no_id() {
        let note = JsonRpcNotification::new("notifications/initialized", None);
        let frame = Frame::Notification(note.clone());
        let encoded = frame.encode().unwrap();
        assert!(!encoded.contains("\"id\""));
        let decoded = Frame::decode(encoded.as_bytes()).unwrap();
        assert_eq!(decoded, Frame::Notification(note));
    }

    #[test]
    fn rejects_wrong_jsonrpc_version() {
        let bad = json!({"jsonrpc": "1.0", "method": "ping", "id": 1});
        let bytes = serde_json::to_vec(&bad).unwrap();
        let err = Frame::decode(&bytes).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidRequest(_)));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = Frame::decode(b"{not json").unwrap_err();
        assert!(matches!(err, ProtocolError::ParseError(_)));
    }

    proptest::proptest! {
        #[test]
        fn request_encode_decode_round_trips(method in "[a-z/]{1,20}", id in proptest::option::of(0i64..1_000_000)) {
            let request_id = match id {
                Some(n) => RequestId::new_number(n),
                None => RequestId::new_string("generated-id"),
            };
            let req = JsonRpcRequest::new(method, None, request_id);
            let frame = Frame::Request(req.clone());
            let encoded = frame.encode().unwrap();
            let decoded = Frame::decode(encoded.as_bytes()).unwrap();
            proptest::prop_assert_eq!(decoded, Frame::Request(req));
        }
    }
}
