//! Handler failure type.

use axum::http::StatusCode;
use thiserror::Error;

use crate::http::ResponseError;

/// Boxed error accepted from arbitrary handler code.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A failure raised by a handler, delivered to the nearest error handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Failure that names the status the error handler should answer with.
    #[error("{message}")]
    Status { status: StatusCode, message: String },

    #[error(transparent)]
    Response(#[from] ResponseError),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The handler panicked; the payload message is kept.
    #[error("handler panicked: {0}")]
    Panic(String),

    #[error(transparent)]
    Other(BoxError),
}

impl HandlerError {
    /// Error answered with `status` by the default error handler.
    pub fn with_status(status: StatusCode, message: impl Into<String>) -> Self {
        HandlerError::Status {
            status,
            message: message.into(),
        }
    }

    /// Wrap any error type.
    pub fn other<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        HandlerError::Other(err.into())
    }

    /// Status carried by the error; 500 when none was given.
    pub fn status(&self) -> StatusCode {
        match self {
            HandlerError::Status { status, .. } => *status,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
