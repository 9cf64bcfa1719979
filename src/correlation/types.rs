//! Pending-call bookkeeping and id allocation for the correlator.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

use tokio::sync::oneshot;

use crate::correlation::error::CorrelationResult;
use crate::protocol::{JsonRpcErrorObject, RequestId};

/// What a call is ultimately resolved with, once the correlator has matched
/// a Response: either the remote's `result`, or its `error` passed through
/// verbatim. Spec.md §4.2's failure semantics: "the caller receives the
/// error (not an exception on the carrier)".
pub type RpcOutcome = std::result::Result<serde_json::Value, JsonRpcErrorObject>;

/// One per outstanding outbound request (spec.md §3, `PendingCall`).
///
/// The one-shot sender is the rendezvous slot the correlator writes the
/// response into; dropping it without sending implicitly resolves the
/// receiver with a `RecvError`, which the waiting side maps to `Disconnected`.
#[derive(Debug)]
pub struct PendingCall {
    pub sender: oneshot::Sender<CorrelationResult<RpcOutcome>>,
    pub created_at: Instant,
}

impl PendingCall {
    pub fn new() -> (Self, oneshot::Receiver<CorrelationResult<RpcOutcome>>) {
        let (sender, receiver) = oneshot::channel();
        (
            Self {
                sender,
                created_at: Instant::now(),
            },
            receiver,
        )
    }
}

/// Monotonically increasing 64-bit id allocator, one per session lifetime
/// (spec.md §4.1 numeric id policy).
#[derive(Debug, Default)]
pub struct RequestIdGenerator {
    counter: AtomicI64,
}

impl RequestIdGenerator {
    pub fn new() -> Self {
        Self {
            counter: AtomicI64::new(1),
        }
    }

    pub fn next_id(&self) -> RequestId {
        let id = self.counter.fetch_add(1, Ordering::SeqCst);
        RequestId::new_number(id)
    }
}
