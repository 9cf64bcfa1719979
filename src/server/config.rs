//! Construction-time declarations for a `ServerCore` (SPEC_FULL.md §4.4
//! supplement).

use crate::protocol::{ProtocolVersion, ServerCapabilities, ServerInfo};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_info: ServerInfo,
    pub protocol_version: ProtocolVersion,
    pub capabilities: ServerCapabilities,
    pub instructions: Option<String>,
    /// Bounded notification-sink capacity for new sessions (spec.md §5:
    /// "default capacity 10-100").
    pub notification_sink_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_info: ServerInfo {
                name: "mcp-runtime".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            protocol_version: ProtocolVersion::current(),
            capabilities: ServerCapabilities::default(),
            instructions: None,
            notification_sink_capacity: 32,
        }
    }
}
