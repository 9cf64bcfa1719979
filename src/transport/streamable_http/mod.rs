//! Streamable-HTTP transport: a single POST endpoint, session identity
//! carried in `Mcp-Session-Id` (spec.md §4.6.4).

mod client;
mod config;
mod server;

pub use client::StreamableHttpClientTransport;
pub use config::StreamableHttpConfig;
pub use server::StreamableHttpServerTransport;

pub const SESSION_HEADER: &str = "Mcp-Session-Id";
