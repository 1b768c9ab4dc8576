//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (App::get / App::mount_at / ...):
//!     pattern string or Regex
//!     → pattern.rs (compile to anchored, case-insensitive regex)
//!     → entry.rs (method constraint + matcher + action)
//!     → appended to the owning App's entry list
//!
//! Request time (dispatch engine):
//!     Entry::test(method, path)
//!     → PathMatch { matched prefix, named captures } or no match
//! ```
//!
//! # Design Decisions
//! - Entries compiled at registration, immutable afterwards
//! - Insertion order is priority: first registered match wins
//! - Bad patterns fail at registration, never at request time

pub mod entry;
pub mod pattern;

use thiserror::Error;

pub use entry::{Action, Entry, IntoAction};
pub use pattern::{compile, CompiledPattern, PathMatch, RoutePath};

/// Errors raised while registering routes.
#[derive(Debug, Error)]
pub enum RouterError {
    /// The pattern did not produce a valid expression.
    #[error("invalid route pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// The action cannot be registered on this kind of entry.
    #[error("invalid handler for {route}: nested applications can only be mounted")]
    InvalidHandler { route: String },

    /// A chain with no handlers was registered.
    #[error("empty handler chain for {route}")]
    EmptyChain { route: String },
}
