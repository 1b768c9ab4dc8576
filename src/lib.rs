//! Switchyard: ordered route matching and handler-chain dispatch over Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server (axum fallback, trace + timeout layers)
//!                         │
//!                         ▼
//!                     app::App::respond
//!                         │  http::context (id, client ip/host/protocol)
//!                         ▼
//!                     dispatch::engine ──▶ routing::entry::test
//!                         │                   (routing::pattern regexes)
//!                         ├── handler  → Flow::Next | Flow::Halt | Err
//!                         ├── chain    → recursive walk
//!                         └── App      → nested walk with own fallbacks
//!                         │
//!                         ▼
//!     Client Response ◀── http::response::Response::into_http
//! ```
//!
//! ```ignore
//! use switchyard::{App, Flow, from_sync};
//!
//! let mut app = App::new();
//! app.get("/users/:id", from_sync(|req, res| {
//!     res.json(&req.params())?;
//!     Ok(Flow::Halt)
//! }))?;
//! app.listen("0.0.0.0:8080").await?;
//! ```

// Core subsystems
pub mod app;
pub mod dispatch;
pub mod http;
pub mod routing;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use app::{App, AppOptions};
pub use config::ServerConfig;
pub use dispatch::{from_fn, from_sync, Chain, Flow, Handler, HandlerError, HandlerResult};
pub use http::{HttpServer, Payload, Request, Response, ResponseError};
pub use lifecycle::Shutdown;
pub use routing::{RoutePath, RouterError};
