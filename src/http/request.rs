//! Per-request context.
//!
//! # Responsibilities
//! - Carry method, headers, body and extensions from the transport
//! - Derive path and query lazily from the current url
//! - Track the dispatch scope: base url, route trail, params
//! - Expose the network view computed by the context adapter
//!
//! # Design Decisions
//! - Path and query are cached against the url they were parsed from;
//!   rewriting the url invalidates them
//! - `original_url` is captured once and never rewritten
//! - Params accumulate across nested matches; later writes win

use std::collections::BTreeMap;
use std::net::{Ipv4Addr, SocketAddr};

use axum::body::Body;
use axum::http::{Extensions, HeaderMap, HeaderName, HeaderValue, Method, Uri, Version};
use serde::Serialize;

use crate::http::context::NetworkInfo;

/// Decoded query string, in the order the pairs appeared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pairs: Vec<(String, String)>,
}

impl Query {
    pub fn parse(raw: &str) -> Self {
        Self {
            pairs: url::form_urlencoded::parse(raw.as_bytes())
                .into_owned()
                .collect(),
        }
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value for a repeated `key`.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Route parameters captured along the dispatch path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, String>);

impl Params {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    /// Merge captures; existing names are overwritten.
    pub fn merge<I>(&mut self, captures: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.0.extend(captures);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Values restored when a matched entry hands control back.
#[derive(Debug, Clone)]
pub(crate) struct Scope {
    base_url: String,
    path: String,
    route: String,
    url: String,
}

/// An incoming request as seen by handlers.
#[derive(Debug)]
pub struct Request {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    extensions: Extensions,
    body: Body,
    peer: SocketAddr,

    url: String,
    original_url: String,
    parsed_url: Option<String>,
    path: String,
    query: Query,

    id: String,
    base_url: String,
    route: String,
    params: Params,
    network: NetworkInfo,
}

impl Request {
    /// Wrap a transport request received from `peer`.
    pub fn from_http(request: axum::http::Request<Body>, peer: SocketAddr) -> Self {
        let (parts, body) = request.into_parts();
        let url = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());

        Self {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            extensions: parts.extensions,
            body,
            peer,
            original_url: url.clone(),
            url,
            parsed_url: None,
            path: String::new(),
            query: Query::default(),
            id: String::new(),
            base_url: "/".to_string(),
            route: "/".to_string(),
            params: Params::default(),
            network: NetworkInfo::default(),
        }
    }

    /// A bodiless request from localhost, mostly for tests.
    pub fn new(method: Method, url: &str) -> Self {
        let mut request = axum::http::Request::new(Body::empty());
        *request.method_mut() = method;
        if let Ok(uri) = url.parse() {
            *request.uri_mut() = uri;
        }
        let mut req = Self::from_http(request, SocketAddr::from((Ipv4Addr::LOCALHOST, 0)));
        req.sync_url();
        req
    }

    /// Add a header, builder style.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (HeaderName::from_bytes(name.as_bytes()), value.parse::<HeaderValue>()) {
            self.headers.append(name, value);
        }
        self
    }

    /// Replace the socket peer, builder style.
    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = peer;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Header value as text; `None` when absent or not visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    /// Take the body, leaving an empty one behind.
    pub fn take_body(&mut self) -> Body {
        std::mem::replace(&mut self.body, Body::empty())
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Url relative to the current mount point.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Rewrite the url; path and query follow on the next dispatch step.
    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    pub fn original_url(&self) -> &str {
        &self.original_url
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }

    pub fn ip(&self) -> &str {
        &self.network.ip
    }

    pub fn ips(&self) -> &[String] {
        &self.network.ips
    }

    pub fn host(&self) -> &str {
        &self.network.host
    }

    pub fn hostname(&self) -> &str {
        &self.network.hostname
    }

    pub fn protocol(&self) -> &str {
        &self.network.protocol
    }

    pub fn secure(&self) -> bool {
        self.network.secure
    }

    pub(crate) fn is_attached(&self) -> bool {
        !self.id.is_empty()
    }

    pub(crate) fn attach(&mut self, id: String, network: NetworkInfo) {
        self.id = id;
        self.original_url = self.url.clone();
        self.base_url = "/".to_string();
        self.route = "/".to_string();
        self.params = Params::default();
        self.network = network;
    }

    /// Re-derive path and query if the url changed since the last parse.
    pub(crate) fn sync_url(&mut self) {
        if self.parsed_url.as_deref() == Some(self.url.as_str()) {
            return;
        }

        let (path, query) = match self.url.split_once('?') {
            Some((path, query)) => (path, Query::parse(query)),
            None => (self.url.as_str(), Query::default()),
        };
        self.path = if path.is_empty() { "/".to_string() } else { path.to_string() };
        self.query = query;
        self.parsed_url = Some(self.url.clone());
    }

    pub(crate) fn scope(&self) -> Scope {
        Scope {
            base_url: self.base_url.clone(),
            path: self.path.clone(),
            route: self.route.clone(),
            url: self.url.clone(),
        }
    }

    pub(crate) fn restore_scope(&mut self, scope: Scope) {
        self.base_url = scope.base_url;
        self.path = scope.path;
        self.route = scope.route;
        self.url = scope.url;
    }

    pub(crate) fn push_route(&mut self, segment: &str) {
        self.route = join_paths(&self.route, segment);
    }

    /// Move `matched` from the front of path and url onto the base url.
    pub(crate) fn consume_prefix(&mut self, matched: &str) {
        self.base_url = join_paths(&self.base_url, matched);
        self.path = ensure_leading_slash(self.path.get(matched.len()..).unwrap_or(""));
        self.url = ensure_leading_slash(self.url.get(matched.len()..).unwrap_or(""));
    }
}

pub(crate) fn ensure_leading_slash(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/// Join two url paths, resolving `.`, `..` and repeated slashes.
///
/// A trailing slash on the joined result is kept.
pub(crate) fn join_paths(base: &str, segment: &str) -> String {
    let joined = if segment.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{segment}")
    };

    let absolute = joined.starts_with('/');
    let trailing = joined.ends_with('/');

    let mut parts: Vec<&str> = Vec::new();
    for part in joined.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            part => parts.push(part),
        }
    }

    let mut out = String::with_capacity(joined.len());
    if absolute {
        out.push('/');
    }
    out.push_str(&parts.join("/"));
    if trailing && !out.ends_with('/') {
        out.push('/');
    }
    if out.is_empty() {
        out.push('.');
    }
    out
}
