//! Handler chain executor.
//!
//! # Responsibilities
//! - Walk an entry list in registration order
//! - Merge captures into params and rewrite the request scope on a match
//! - Restore the scope when a matched entry hands control back
//! - Turn handler panics into errors
//!
//! # Design Decisions
//! - Recursion through boxed futures: chains and nested apps call back in
//! - Errors propagate immediately with no scope restore
//! - The response is checked before each entry, not after

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures_util::future::{BoxFuture, FutureExt};

use crate::dispatch::error::HandlerError;
use crate::dispatch::handler::{Flow, Handler, HandlerResult};
use crate::http::{Request, Response};
use crate::routing::{Action, Entry};

/// How a walk over an entry list ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every entry ran or was skipped and control came back.
    Exhausted,
    /// A handler stopped the walk or the response was finished.
    Halted,
}

impl From<Flow> for Outcome {
    fn from(flow: Flow) -> Self {
        match flow {
            Flow::Next => Outcome::Exhausted,
            Flow::Halt => Outcome::Halted,
        }
    }
}

pub type DispatchResult = Result<Outcome, HandlerError>;

/// Run `entries` against the request.
pub fn dispatch<'a>(
    entries: &'a [Entry],
    req: &'a mut Request,
    res: &'a mut Response,
) -> BoxFuture<'a, DispatchResult> {
    Box::pin(async move {
        for entry in entries {
            if res.is_finished() {
                tracing::trace!(request_id = %req.id(), "Response finished, walk stopped");
                return Ok(Outcome::Halted);
            }

            req.sync_url();

            let Some(found) = entry.test(req.method(), req.path()) else {
                continue;
            };

            req.params_mut().merge(found.params);

            let scope = req.scope();
            req.push_route(entry.label().unwrap_or(found.matched.as_str()));
            if entry.is_prefix() && found.matched != "/" {
                req.consume_prefix(&found.matched);
            }

            tracing::debug!(
                request_id = %req.id(),
                route = %req.route(),
                base_url = %req.base_url(),
                path = %req.path(),
                "Entry matched"
            );

            match run(entry.action(), req, res).await? {
                Outcome::Exhausted => req.restore_scope(scope),
                Outcome::Halted => return Ok(Outcome::Halted),
            }
        }

        if res.is_finished() {
            Ok(Outcome::Halted)
        } else {
            Ok(Outcome::Exhausted)
        }
    })
}

async fn run(action: &Action, req: &mut Request, res: &mut Response) -> DispatchResult {
    match action {
        Action::Handler(handler) => invoke(handler.as_ref(), req, res).await.map(Outcome::from),
        Action::Chain(entries) => dispatch(entries, req, res).await,
        Action::App(app) => app.handle(req, res).await,
    }
}

async fn invoke(handler: &dyn Handler, req: &mut Request, res: &mut Response) -> HandlerResult {
    let call = AssertUnwindSafe(async { handler.call(req, res).await });

    match call.catch_unwind().await {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!(panic = %message, "Handler panicked");
            Err(HandlerError::Panic(message))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
