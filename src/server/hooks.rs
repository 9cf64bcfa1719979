//! Observer callbacks invoked around dispatch (spec.md §4.4, "Hooks").
//!
//! All hook lists are observers only — they never change the response; an
//! implementation that needs a mutating variant is explicitly out of scope
//! per spec.md.

use std::collections::HashMap;
use std::sync::Arc;

use crate::protocol::{JsonRpcErrorObject, RequestId};
use crate::server::error::ServerError;

/// Read-only view of the call a hook is observing.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub session_id: String,
    pub method: String,
    pub request_id: Option<RequestId>,
}

pub type BeforeHook = Arc<dyn Fn(&HookContext) + Send + Sync>;
pub type AfterHook =
    Arc<dyn Fn(&HookContext, &Result<serde_json::Value, JsonRpcErrorObject>) + Send + Sync>;
pub type ErrorHook = Arc<dyn Fn(&HookContext, &ServerError) + Send + Sync>;

/// One record collecting every observation callback, set at construction
/// (spec.md's "explicit Hook record" design note).
#[derive(Default, Clone)]
pub struct Hooks {
    pub before_any: Vec<BeforeHook>,
    pub after_any: Vec<AfterHook>,
    pub on_error: Vec<ErrorHook>,
    pub before_method: HashMap<String, Vec<BeforeHook>>,
    pub after_method: HashMap<String, Vec<AfterHook>>,
}

impl Hooks {
    pub fn run_before(&self, ctx: &HookContext) {
        for hook in &self.before_any {
            hook(ctx);
        }
        if let Some(hooks) = self.before_method.get(&ctx.method) {
            for hook in hooks {
                hook(ctx);
            }
        }
    }

    pub fn run_after(&self, ctx: &HookContext, result: &Result<serde_json::Value, JsonRpcErrorObject>) {
        for hook in &self.after_any {
            hook(ctx, result);
        }
        if let Some(hooks) = self.after_method.get(&ctx.method) {
            for hook in hooks {
                hook(ctx, result);
            }
        }
    }

    pub fn run_error(&self, ctx: &HookContext, error: &ServerError) {
        for hook in &self.on_error {
            hook(ctx, error);
        }
    }
}
