//! Response building.
//!
//! # Responsibilities
//! - Accumulate status, headers and body for one request
//! - Content-type shorthands (`html`, `json`, `text`, `txt`, `xml`)
//! - Send text, bytes, JSON or a stream; redirects
//! - Convert into the transport response
//!
//! # Design Decisions
//! - A response is finished once ended (buffered send) or handled (stream
//!   piped); the dispatch walk stops at the next entry
//! - Sending twice is ignored and logged, never a panic
//! - Content-Type set by a handler is never overwritten by a send default

use axum::body::{Body, Bytes};
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::StatusCode;
use futures_util::TryStream;
use serde::Serialize;
use thiserror::Error;

const OCTET_STREAM: &str = "application/octet-stream";

/// Errors from response helpers.
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("no Content-Type defined for '{0}'")]
    UnknownContentType(String),

    #[error("invalid header: {0}")]
    Header(#[from] axum::http::Error),

    #[error("failed to serialize body: {0}")]
    Json(#[from] serde_json::Error),
}

/// Map a content-type shorthand to its MIME type.
pub fn mime_for(identifier: &str) -> Option<&'static str> {
    match identifier.to_ascii_lowercase().as_str() {
        "html" => Some("text/html"),
        "json" => Some("application/json"),
        "text" | "txt" => Some("text/plain"),
        "xml" => Some("application/xml"),
        _ => None,
    }
}

/// Anything [`Response::send`] accepts.
#[derive(Debug)]
pub enum Payload {
    /// Sends the reason phrase of the current status.
    Empty,
    Text(String),
    Bytes(Bytes),
    Json(serde_json::Value),
    Stream(Body),
}

impl From<()> for Payload {
    fn from(_: ()) -> Self {
        Payload::Empty
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Payload::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Bytes(Bytes::from(bytes))
    }
}

impl From<&'static [u8]> for Payload {
    fn from(bytes: &'static [u8]) -> Self {
        Payload::Bytes(Bytes::from_static(bytes))
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Payload::Json(value)
    }
}

impl From<Body> for Payload {
    fn from(body: Body) -> Self {
        Payload::Stream(body)
    }
}

#[derive(Debug, Default)]
enum ResponseBody {
    #[default]
    Empty,
    Full(Bytes),
    Stream(Body),
}

/// The response under construction for one request.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: ResponseBody,
    ended: bool,
    handled: bool,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: ResponseBody::Empty,
            ended: false,
            handled: false,
        }
    }

    pub fn status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Header value as text.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Set (replace) a header.
    pub fn set_header<K, V>(&mut self, name: K, value: V) -> Result<&mut Self, ResponseError>
    where
        K: TryInto<HeaderName>,
        K::Error: Into<axum::http::Error>,
        V: TryInto<HeaderValue>,
        V::Error: Into<axum::http::Error>,
    {
        let name = name.try_into().map_err(|e| ResponseError::Header(e.into()))?;
        let value = value.try_into().map_err(|e| ResponseError::Header(e.into()))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Set Content-Type from a shorthand or a full MIME type.
    pub fn content_type(&mut self, identifier: &str) -> Result<&mut Self, ResponseError> {
        let mime = match mime_for(identifier) {
            Some(mime) => mime.to_string(),
            None if identifier.contains('/') => identifier.to_string(),
            None => return Err(ResponseError::UnknownContentType(identifier.to_string())),
        };
        self.set_header(header::CONTENT_TYPE, mime)
    }

    /// Serialize `value` and send it as `application/json`.
    pub fn json<T>(&mut self, value: &T) -> Result<&mut Self, ResponseError>
    where
        T: Serialize + ?Sized,
    {
        let body = serde_json::to_string(value)?;
        self.content_type("json")?;
        Ok(self.send(body))
    }

    /// Send `payload` and end the response.
    ///
    /// A stream body is handed to the transport as-is and marks the
    /// response handled instead of ended.
    pub fn send(&mut self, payload: impl Into<Payload>) -> &mut Self {
        if self.is_finished() {
            tracing::warn!(status = %self.status, "Response already sent, payload dropped");
            return self;
        }

        let (bytes, default_type) = match payload.into() {
            Payload::Stream(body) => {
                self.default_content_type(OCTET_STREAM);
                self.headers.remove(header::CONTENT_LENGTH);
                self.body = ResponseBody::Stream(body);
                self.handled = true;
                return self;
            }
            Payload::Empty => (
                Bytes::from_static(self.status.canonical_reason().unwrap_or("").as_bytes()),
                "text/plain",
            ),
            Payload::Text(text) => (Bytes::from(text), "text/plain"),
            Payload::Bytes(bytes) => (bytes, OCTET_STREAM),
            Payload::Json(value) => (Bytes::from(value.to_string()), "application/json"),
        };

        self.default_content_type(default_type);
        self.headers
            .insert(header::CONTENT_LENGTH, HeaderValue::from(bytes.len()));
        self.body = ResponseBody::Full(bytes);
        self.ended = true;
        self
    }

    /// End the response with no body.
    pub fn end(&mut self) -> &mut Self {
        if self.is_finished() {
            tracing::warn!(status = %self.status, "Response already sent, end ignored");
            return self;
        }
        self.headers
            .insert(header::CONTENT_LENGTH, HeaderValue::from(0usize));
        self.body = ResponseBody::Empty;
        self.ended = true;
        self
    }

    /// Set the status and send its reason phrase.
    pub fn send_status(&mut self, status: StatusCode) -> &mut Self {
        self.status(status).send(())
    }

    /// Stream a body from `stream`.
    pub fn pipe<S>(&mut self, stream: S) -> &mut Self
    where
        S: TryStream + Send + 'static,
        S::Ok: Into<Bytes>,
        S::Error: Into<axum::BoxError>,
    {
        self.send(Body::from_stream(stream))
    }

    /// Redirect with `302 Found` and end the response.
    pub fn redirect(&mut self, location: &str) -> Result<&mut Self, ResponseError> {
        self.redirect_with(StatusCode::FOUND, location)
    }

    /// Redirect with an explicit status and end the response.
    pub fn redirect_with(&mut self, status: StatusCode, location: &str) -> Result<&mut Self, ResponseError> {
        self.location(Some(status), location)?;
        Ok(self.send(()))
    }

    /// Set status (default `301`) and the Location header without ending.
    pub fn location(&mut self, status: Option<StatusCode>, location: &str) -> Result<&mut Self, ResponseError> {
        self.set_header(header::LOCATION, location)?;
        self.status = status.unwrap_or(StatusCode::MOVED_PERMANENTLY);
        Ok(self)
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// True once a stream has been handed over.
    pub fn is_handled(&self) -> bool {
        self.handled
    }

    pub fn is_finished(&self) -> bool {
        self.ended || self.handled
    }

    /// Buffered body, if one was sent.
    pub fn body(&self) -> Option<&Bytes> {
        match &self.body {
            ResponseBody::Full(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Convert into the transport response.
    pub fn into_http(self) -> axum::response::Response {
        let body = match self.body {
            ResponseBody::Empty => Body::empty(),
            ResponseBody::Full(bytes) => Body::from(bytes),
            ResponseBody::Stream(body) => body,
        };

        let mut response = axum::response::Response::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }

    fn default_content_type(&mut self, mime: &'static str) {
        if !self.headers.contains_key(header::CONTENT_TYPE) {
            self.headers
                .insert(header::CONTENT_TYPE, HeaderValue::from_static(mime));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_text(res: &Response) -> &str {
        std::str::from_utf8(res.body().unwrap()).unwrap()
    }

    #[test]
    fn test_send_text() {
        let mut res = Response::new();
        res.send("hello");

        assert!(res.is_ended());
        assert_eq!(res.header("content-type"), Some("text/plain"));
        assert_eq!(res.header("content-length"), Some("5"));
        assert_eq!(body_text(&res), "hello");
    }

    #[test]
    fn test_send_empty_uses_reason_phrase() {
        let mut res = Response::new();
        res.send_status(StatusCode::NOT_FOUND);

        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(&res), "Not Found");
    }

    #[test]
    fn test_send_bytes_and_json_defaults() {
        let mut res = Response::new();
        res.send(vec![0u8, 1, 2]);
        assert_eq!(res.header("content-type"), Some(OCTET_STREAM));

        let mut res = Response::new();
        res.send(serde_json::json!({ "ok": true }));
        assert_eq!(res.header("content-type"), Some("application/json"));
        assert_eq!(body_text(&res), r#"{"ok":true}"#);
    }

    #[test]
    fn test_explicit_content_type_is_kept() {
        let mut res = Response::new();
        res.content_type("html").unwrap().send("<p>hi</p>");
        assert_eq!(res.header("content-type"), Some("text/html"));

        let mut res = Response::new();
        res.content_type("image/png").unwrap().send(vec![1u8]);
        assert_eq!(res.header("content-type"), Some("image/png"));
    }

    #[test]
    fn test_unknown_content_type() {
        let mut res = Response::new();
        let err = res.content_type("yaml").unwrap_err();
        assert!(matches!(err, ResponseError::UnknownContentType(ref id) if id == "yaml"));
        assert_eq!(err.to_string(), "no Content-Type defined for 'yaml'");
    }

    #[test]
    fn test_json_overrides_content_type() {
        let mut res = Response::new();
        res.content_type("text").unwrap();
        res.status(StatusCode::CREATED).json(&vec![1, 2, 3]).unwrap();

        assert_eq!(res.status_code(), StatusCode::CREATED);
        assert_eq!(res.header("content-type"), Some("application/json"));
        assert_eq!(body_text(&res), "[1,2,3]");
    }

    #[test]
    fn test_end_without_body() {
        let mut res = Response::new();
        res.status(StatusCode::NO_CONTENT).end();

        assert!(res.is_ended());
        assert!(res.body().is_none());
        assert_eq!(res.header("content-length"), Some("0"));
        assert_eq!(res.header("content-type"), None);
    }

    #[test]
    fn test_second_send_is_ignored() {
        let mut res = Response::new();
        res.send("first");
        res.status(StatusCode::BAD_REQUEST).send("second");

        assert_eq!(body_text(&res), "first");
    }

    #[test]
    fn test_redirect_modes() {
        let mut res = Response::new();
        res.redirect("/login").unwrap();
        assert_eq!(res.status_code(), StatusCode::FOUND);
        assert_eq!(res.header("location"), Some("/login"));
        assert!(res.is_ended());

        let mut res = Response::new();
        res.redirect_with(StatusCode::SEE_OTHER, "/done").unwrap();
        assert_eq!(res.status_code(), StatusCode::SEE_OTHER);
        assert_eq!(body_text(&res), "See Other");

        let mut res = Response::new();
        res.location(None, "/moved").unwrap();
        assert_eq!(res.status_code(), StatusCode::MOVED_PERMANENTLY);
        assert!(!res.is_finished());
    }

    #[test]
    fn test_pipe_marks_handled() {
        let chunks = futures_util::stream::iter(vec![
            Ok::<_, std::io::Error>(Bytes::from_static(b"a")),
            Ok(Bytes::from_static(b"b")),
        ]);

        let mut res = Response::new();
        res.pipe(chunks);

        assert!(res.is_handled());
        assert!(!res.is_ended());
        assert!(res.is_finished());
        assert!(res.body().is_none());
        assert_eq!(res.header("content-type"), Some(OCTET_STREAM));
    }

    #[tokio::test]
    async fn test_into_http() {
        let mut res = Response::new();
        res.set_header("x-request-id", "abc12").unwrap();
        res.status(StatusCode::ACCEPTED).send("queued");

        let response = res.into_http();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.headers()["x-request-id"], "abc12");

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"queued");
    }

    #[test]
    fn test_invalid_header_value() {
        let mut res = Response::new();
        assert!(matches!(
            res.set_header("x-bad", "line\nbreak"),
            Err(ResponseError::Header(_))
        ));
    }
}
