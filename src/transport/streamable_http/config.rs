//! Configuration for the Streamable-HTTP transport.

#[derive(Debug, Clone)]
pub struct StreamableHttpConfig {
    pub bind_addr: String,
    pub endpoint_path: String,
    /// Prefer a short-lived `text/event-stream` response over a single
    /// `application/json` body when the client's `Accept` header allows it.
    pub prefer_sse_responses: bool,
}

impl Default for StreamableHttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:0".to_string(),
            endpoint_path: "/mcp".to_string(),
            prefer_sse_responses: false,
        }
    }
}
