//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → wait_for_signal resolves
//!
//! Shutdown (shutdown.rs):
//!     Shutdown::trigger → every subscribed server stops accepting
//!     → in-flight requests drain → HttpServer::run returns
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
