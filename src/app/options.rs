//! Per-application options: fallbacks and proxy trust.

use std::fmt;
use std::sync::Arc;

use axum::http::StatusCode;

use crate::config::AppConfig;
use crate::dispatch::HandlerError;
use crate::http::{Request, Response};

/// Runs when no entry finished the response.
pub type NoMatchHandler = Arc<dyn Fn(&mut Request, &mut Response) + Send + Sync>;

/// Runs when a handler failed.
pub type ErrorHandler = Arc<dyn Fn(HandlerError, &mut Request, &mut Response) + Send + Sync>;

/// Options controlling an [`App`](crate::app::App)'s fallbacks.
///
/// A disabled fallback hands the request (or the error) back to the
/// enclosing application.
#[derive(Clone)]
pub struct AppOptions {
    no_match_handler: Option<NoMatchHandler>,
    error_handler: Option<ErrorHandler>,
    trust_proxy: Option<bool>,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            no_match_handler: Some(Arc::new(default_no_match)),
            error_handler: Some(Arc::new(default_error)),
            trust_proxy: None,
        }
    }
}

impl AppOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn no_match_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut Request, &mut Response) + Send + Sync + 'static,
    {
        self.no_match_handler = Some(Arc::new(handler));
        self
    }

    /// Fall through to the enclosing app when nothing matched.
    pub fn disable_no_match_handler(mut self) -> Self {
        self.no_match_handler = None;
        self
    }

    pub fn error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(HandlerError, &mut Request, &mut Response) + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    /// Propagate errors to the enclosing app.
    pub fn disable_error_handler(mut self) -> Self {
        self.error_handler = None;
        self
    }

    /// Trust (or distrust) forwarding headers regardless of the peer.
    pub fn trust_proxy(mut self, trust: bool) -> Self {
        self.trust_proxy = Some(trust);
        self
    }

    pub fn trusts_proxy(&self) -> Option<bool> {
        self.trust_proxy
    }

    pub fn get_no_match_handler(&self) -> Option<&NoMatchHandler> {
        self.no_match_handler.as_ref()
    }

    pub fn get_error_handler(&self) -> Option<&ErrorHandler> {
        self.error_handler.as_ref()
    }
}

impl From<&AppConfig> for AppOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            trust_proxy: config.trust_proxy,
            ..Self::default()
        }
    }
}

impl fmt::Debug for AppOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppOptions")
            .field("no_match_handler", &self.no_match_handler.is_some())
            .field("error_handler", &self.error_handler.is_some())
            .field("trust_proxy", &self.trust_proxy)
            .finish()
    }
}

fn default_no_match(req: &mut Request, res: &mut Response) {
    tracing::debug!(request_id = %req.id(), path = %req.path(), "No route matched");
    res.status(StatusCode::NOT_FOUND).end();
}

fn default_error(err: HandlerError, req: &mut Request, res: &mut Response) {
    let status = err.status();
    if status.is_server_error() {
        tracing::error!(request_id = %req.id(), route = %req.route(), error = %err, "Handler failed");
    } else {
        tracing::warn!(request_id = %req.id(), route = %req.route(), error = %err, "Handler failed");
    }
    res.send_status(status);
}
