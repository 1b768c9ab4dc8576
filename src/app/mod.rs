//! Application shell.
//!
//! # Data Flow
//! ```text
//! Registration:
//!     App::get / post / ... / all   → exact route entry
//!     App::mount / mount_at         → prefix entry (handler, chain or App)
//!
//! Request:
//!     HttpServer → App::respond
//!         → App::handle (attach context, walk entries)
//!             exhausted → no-match handler (404 by default)
//!             failed    → error handler (status from the error, else 500)
//!         → Response::into_http
//! ```
//!
//! # Design Decisions
//! - Verb methods are generated from one macro table
//! - A nested App with a disabled fallback defers to its parent
//! - Errors reach the nearest enclosing error handler exactly once

pub mod application;
pub mod options;

pub use application::App;
pub use options::{AppOptions, ErrorHandler, NoMatchHandler};
