//! HTTP request/response subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum fallback, tracing + timeout layers)
//!     → request.rs (wrap transport request, lazy path/query)
//!     → context.rs (request id, trusted proxy view; once per request)
//!     → [dispatch engine walks the App's entries]
//!     → response.rs (status, headers, body helpers)
//!     → Send to client
//! ```

pub mod context;
pub mod request;
pub mod response;
pub mod server;

pub use context::NetworkInfo;
pub use request::{Params, Query, Request};
pub use response::{Payload, Response, ResponseError};
pub use server::HttpServer;
