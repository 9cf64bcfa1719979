//! Subprocess-over-standard-streams transport (spec.md §4.6.1, §4.6.2).

mod client;
mod server;

pub use client::{StdioClientConfig, StdioClientTransport};
pub use server::StdioServerTransport;
