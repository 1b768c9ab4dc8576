//! Handler model.
//!
//! A handler receives the request and response and decides whether the
//! walk continues:
//!
//! ```ignore
//! app.get("/users/:id", from_fn(|req, res| Box::pin(async move {
//!     let id = req.params().get("id").unwrap_or_default().to_string();
//!     res.json(&serde_json::json!({ "id": id }))?;
//!     Ok(Flow::Halt)
//! })))?;
//! ```
//!
//! Synchronous handlers skip the boxing with [`from_sync`].

use futures_util::future::BoxFuture;

use crate::dispatch::error::HandlerError;
use crate::http::{Request, Response};

/// Continuation decision returned by every handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Continue with the next matching entry.
    Next,
    /// Stop here.
    Halt,
}

pub type HandlerResult = Result<Flow, HandlerError>;

/// An async request handler.
pub trait Handler: Send + Sync + 'static {
    fn call<'a>(&'a self, req: &'a mut Request, res: &'a mut Response)
        -> BoxFuture<'a, HandlerResult>;
}

impl<F> Handler for F
where
    F: for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, HandlerResult>
        + Send
        + Sync
        + 'static,
{
    fn call<'a>(&'a self, req: &'a mut Request, res: &'a mut Response)
        -> BoxFuture<'a, HandlerResult> {
        (self)(req, res)
    }
}

pub type BoxedHandler = Box<dyn Handler>;

/// Pins down the higher-ranked signature so closures infer correctly.
pub fn from_fn<F>(f: F) -> F
where
    F: for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, HandlerResult>
        + Send
        + Sync
        + 'static,
{
    f
}

/// Handler backed by a synchronous function.
pub struct SyncHandler<F>(F);

/// Wrap a synchronous function as a [`Handler`].
pub fn from_sync<F>(f: F) -> SyncHandler<F>
where
    F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
{
    SyncHandler(f)
}

impl<F> Handler for SyncHandler<F>
where
    F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
{
    fn call<'a>(&'a self, req: &'a mut Request, res: &'a mut Response)
        -> BoxFuture<'a, HandlerResult> {
        // runs when polled so panics surface inside the engine's catch
        Box::pin(async move { (self.0)(req, res) })
    }
}

/// An ordered group of handlers registered as one unit.
#[derive(Default)]
pub struct Chain {
    handlers: Vec<BoxedHandler>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler.
    pub fn then<H: Handler>(mut self, handler: H) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub(crate) fn into_handlers(self) -> Vec<BoxedHandler> {
        self.handlers
    }
}

/// Build a [`Chain`] from handlers.
///
/// ```ignore
/// app.get("/admin", chain![authenticate, audit, render_dashboard])?;
/// ```
#[macro_export]
macro_rules! chain {
    ($($handler:expr),* $(,)?) => {
        $crate::dispatch::Chain::new()$(.then($handler))*
    };
}
