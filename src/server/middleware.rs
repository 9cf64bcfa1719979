//! Middleware chain applied "outermost-first, ending at the handler"
//! (spec.md §4.4 step 7). Modeled the way the teacher's HTTP stack layers
//! `tower` services, specialized to this crate's method-handler shape.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::protocol::JsonRpcRequest;
use crate::server::error::ServerResult;
use crate::server::handlers::RequestContext;

pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = ServerResult<Value>> + Send + 'a>>;
pub type Terminal<'a> = dyn Fn(Arc<RequestContext>, JsonRpcRequest) -> HandlerFuture<'a> + Send + Sync + 'a;

/// The remaining middleware chain plus the terminal handler call. Each
/// middleware decides whether (and how) to call `next.run(...)`.
pub struct Next<'a> {
    middlewares: &'a [Arc<dyn Middleware>],
    terminal: &'a Terminal<'a>,
}

impl<'a> Next<'a> {
    pub fn new(middlewares: &'a [Arc<dyn Middleware>], terminal: &'a Terminal<'a>) -> Self {
        Self {
            middlewares,
            terminal,
        }
    }

    pub async fn run(self, ctx: Arc<RequestContext>, request: JsonRpcRequest) -> ServerResult<Value> {
        match self.middlewares.split_first() {
            Some((mw, rest)) => {
                let next = Next {
                    middlewares: rest,
                    terminal: self.terminal,
                };
                mw.handle(ctx, request, next).await
            }
            None => (self.terminal)(ctx, request).await,
        }
    }
}

#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle<'a>(
        &'a self,
        ctx: Arc<RequestContext>,
        request: JsonRpcRequest,
        next: Next<'a>,
    ) -> ServerResult<Value>;
}
