//! Request/response correlation, notification fan-out, and id allocation
//! on top of a `Transport` (spec.md §4.2).

pub mod config;
pub mod error;
pub mod manager;
pub mod types;

pub use config::CorrelationConfig;
pub use error::{CorrelationError, CorrelationResult};
pub use manager::{Correlator, NotificationHandler};
pub use types::{PendingCall, RequestIdGenerator, RpcOutcome};
