//! Configuration for the SSE server transport (spec.md §4.6.3).

use std::time::Duration;

/// Controls how the `endpoint` event's URL is constructed and where the
/// server binds.
#[derive(Debug, Clone)]
pub struct SseServerConfig {
    pub bind_addr: String,
    /// Full origin (`https://host:port`) prefixed onto the message endpoint
    /// URL when `absolute_endpoint_url` is set. Ignored otherwise.
    pub base_url: Option<String>,
    pub base_path: String,
    /// Emit a full URL in the `endpoint` event rather than a path-only one.
    pub absolute_endpoint_url: bool,
    /// Periodic `event: ping` frames on each open stream; `None` disables
    /// keep-alive.
    pub keep_alive_interval: Option<Duration>,
}

impl Default for SseServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:0".to_string(),
            base_url: None,
            base_path: String::new(),
            absolute_endpoint_url: false,
            keep_alive_interval: Some(Duration::from_secs(30)),
        }
    }
}
