//! Handler dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! App::handle(req, res)
//!     → engine.rs (walk entries in order)
//!         → Entry::test → params merged, route/base_url/path/url rewritten
//!         → handler.rs (invoke handler, panic captured)
//!             Flow::Next  → scope restored, next entry
//!             Flow::Halt  → stop, response owns the request
//!             Err(e)      → error.rs, propagated to the nearest error handler
//!         → nested chain / nested App (recursive dispatch)
//!     → Outcome::Exhausted | Outcome::Halted
//! ```
//!
//! # Design Decisions
//! - One request is one future: entries never run concurrently
//! - A finished response stops the walk before the next entry
//! - Errors bypass every remaining entry at every nesting level

pub mod engine;
pub mod error;
pub mod handler;

pub use engine::{dispatch, DispatchResult, Outcome};
pub use error::HandlerError;
pub use handler::{from_fn, from_sync, BoxedHandler, Chain, Flow, Handler, HandlerResult};
