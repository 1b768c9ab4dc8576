//! Path pattern compilation.
//!
//! # Responsibilities
//! - Turn a path pattern (`/users/:id`, `/files/*`, `/:id.(json|xml)`) into a
//!   case-insensitive regular expression
//! - Keep the original pattern as a label for the request's route trail
//! - Pass hand-written `Regex` patterns through untouched
//!
//! # Pattern Syntax
//! ```text
//! /users          literal segment (escaped, case-insensitive)
//! /:id            required parameter, one segment, captured as `id`
//! /:id?           optional parameter; the segment and its slash may be absent
//! /:id.json       parameter followed by a literal extension
//! /:id.(json|xml) parameter followed by an extension captured as `ext`
//! /*              remainder of the path (slashes included), captured as `wild`
//! ```
//!
//! # Design Decisions
//! - Empty segments are skipped, so `//` behaves like `/`
//! - Exact patterns accept one optional trailing slash
//! - Prefix patterns must end on a segment boundary: `/foo` matches `/foo/bar`
//!   but never `/foot`. The body is wrapped in group 1 and followed by
//!   `(?:/|$)`; group 1's span is the consumed prefix.

use regex::{Regex, RegexBuilder};

use crate::routing::RouterError;

/// Capture name used for `*` segments.
pub const WILDCARD_PARAM: &str = "wild";

/// Capture name used for `.(a|b)` extension alternations.
pub const EXTENSION_PARAM: &str = "ext";

/// A route pattern as supplied at registration.
#[derive(Debug, Clone)]
pub enum RoutePath {
    /// Pattern string using the syntax above.
    Pattern(String),
    /// Pre-built expression; named groups become params.
    Regex(Regex),
}

impl From<&str> for RoutePath {
    fn from(pattern: &str) -> Self {
        RoutePath::Pattern(pattern.to_string())
    }
}

impl From<String> for RoutePath {
    fn from(pattern: String) -> Self {
        RoutePath::Pattern(pattern)
    }
}

impl From<Regex> for RoutePath {
    fn from(regex: Regex) -> Self {
        RoutePath::Regex(regex)
    }
}

/// Result of applying a compiled pattern to a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMatch {
    /// The portion of the path the pattern consumed.
    pub matched: String,
    /// Named captures that took part in the match.
    pub params: Vec<(String, String)>,
}

/// A compiled route matcher.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    label: Option<String>,
    regex: Regex,
    prefix_group: bool,
}

impl CompiledPattern {
    /// Original pattern string; `None` for raw expressions.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// The underlying expression.
    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    /// Test `path` and collect the consumed prefix and captures.
    pub fn captures(&self, path: &str) -> Option<PathMatch> {
        let caps = self.regex.captures(path)?;
        let span = if self.prefix_group { caps.get(1) } else { caps.get(0) };
        let matched = span.map(|m| m.as_str()).unwrap_or_default().to_string();

        let params = self
            .regex
            .capture_names()
            .flatten()
            .filter_map(|name| {
                caps.name(name)
                    .map(|value| (name.to_string(), value.as_str().to_string()))
            })
            .collect();

        Some(PathMatch { matched, params })
    }

    /// Convenience for tests and diagnostics.
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

/// Compile a route path.
///
/// `prefix` selects middleware semantics: the pattern may match a leading
/// portion of the path, ending at a `/` or at the end of the path.
pub fn compile(path: impl Into<RoutePath>, prefix: bool) -> Result<CompiledPattern, RouterError> {
    let pattern = match path.into() {
        RoutePath::Regex(regex) => {
            return Ok(CompiledPattern {
                label: None,
                regex,
                prefix_group: false,
            })
        }
        RoutePath::Pattern(pattern) => pattern,
    };

    let body = pattern_body(&pattern);
    let source = if prefix {
        format!("^({body})(?:/|$)")
    } else {
        format!("^{body}/?$")
    };

    let regex = RegexBuilder::new(&source)
        .case_insensitive(true)
        .build()
        .map_err(|source| RouterError::Pattern {
            pattern: pattern.clone(),
            source,
        })?;

    tracing::trace!(pattern = %pattern, regex = %regex, prefix, "Compiled route pattern");

    Ok(CompiledPattern {
        label: Some(pattern),
        regex,
        prefix_group: prefix,
    })
}

/// Translate each non-empty segment into its expression fragment.
fn pattern_body(pattern: &str) -> String {
    let mut body = String::with_capacity(pattern.len() * 2);

    for segment in pattern.split('/').filter(|s| !s.is_empty()) {
        if segment.starts_with('*') {
            body.push_str("/(?P<");
            body.push_str(WILDCARD_PARAM);
            body.push_str(">.*)");
        } else if let Some(param) = segment.strip_prefix(':') {
            push_param(&mut body, param);
        } else {
            body.push('/');
            body.push_str(&regex::escape(segment));
        }
    }

    body
}

/// `param` is the segment without its leading `:`.
fn push_param(body: &mut String, param: &str) {
    let optional = param.find('?');
    let extension = param.find('.');

    match optional {
        Some(end) => {
            body.push_str("(?:/(?P<");
            body.push_str(&param[..end]);
            body.push_str(">[^/]+?))?");
        }
        None => {
            let end = extension.unwrap_or(param.len());
            body.push_str("/(?P<");
            body.push_str(&param[..end]);
            body.push_str(">[^/]+?)");
        }
    }

    if let Some(dot) = extension {
        let suffix = &param[dot..];
        match suffix.strip_prefix(".(") {
            // the closing paren of the alternation is part of the suffix
            Some(alternation) => {
                body.push_str("\\.(?P<");
                body.push_str(EXTENSION_PARAM);
                body.push('>');
                body.push_str(alternation);
            }
            None => body.push_str(&regex::escape(suffix)),
        }
    }
}
