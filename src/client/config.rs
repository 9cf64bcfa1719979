//! Construction-time declarations for a `ClientCore` (SPEC_FULL.md §4.3
//! supplement, mirrored from `ServerConfig`).

use crate::protocol::{ClientCapabilities, ClientInfo, ProtocolVersion};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_info: ClientInfo,
    pub protocol_version: ProtocolVersion,
    pub capabilities: ClientCapabilities,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_info: ClientInfo {
                name: "mcp-runtime-client".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            protocol_version: ProtocolVersion::current(),
            capabilities: ClientCapabilities::default(),
        }
    }
}
