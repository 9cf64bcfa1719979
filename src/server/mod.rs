//! The typed method router, capability gating, catalog, hooks, middleware,
//! and session registry (spec.md §4.4, §4.5).

pub mod catalog;
pub mod config;
pub mod core;
pub mod error;
pub mod handlers;
pub mod hooks;
pub mod middleware;
pub mod session;

pub use catalog::ServerCatalog;
pub use config::ServerConfig;
pub use core::{ServerCore, ServerCoreBuilder};
pub use error::{ServerError, ServerResult};
pub use handlers::{
    NotificationListener, PromptHandler, RequestContext, ResourceHandler, ToolFilter, ToolHandler,
};
pub use hooks::{HookContext, Hooks};
pub use middleware::Middleware;
pub use session::{Session, SessionRegistry, SessionState};
