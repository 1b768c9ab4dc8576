//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events with structured fields (request_id, route, status)
//!     → logging.rs (subscriber: env filter + fmt layer)
//!
//! Per request:
//!     → tower-http TraceLayer (HTTP-level spans)
//!     → "request" span around App::respond
//! ```
//!
//! # Design Decisions
//! - RUST_LOG wins over the configured level
//! - Request id flows through every event of a request

pub mod logging;
