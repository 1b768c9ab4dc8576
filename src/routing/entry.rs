//! Registered route entries.
//!
//! # Responsibilities
//! - Hold one registered unit: verb constraint, compiled matcher, action
//! - Decide whether the entry applies to a request
//!
//! # Design Decisions
//! - The action is a tagged enum with exactly one arm populated
//! - A HEAD request also matches GET entries
//! - Entries without a matcher apply unconditionally

use std::sync::Arc;

use axum::http::Method;

use crate::app::App;
use crate::dispatch::handler::{BoxedHandler, Chain, Handler};
use crate::routing::pattern::{CompiledPattern, PathMatch};

/// What a matched entry runs.
pub enum Action {
    /// A single handler.
    Handler(BoxedHandler),
    /// Handlers run in order, each one continuing to the next.
    Chain(Vec<Entry>),
    /// A nested application with its own entries and fallbacks.
    App(Arc<App>),
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Handler(_) => f.write_str("Handler"),
            Action::Chain(entries) => f.debug_tuple("Chain").field(&entries.len()).finish(),
            Action::App(app) => f.debug_tuple("App").field(&app.entries().len()).finish(),
        }
    }
}

/// Conversion into an entry action.
///
/// Implemented for any [`Handler`], for [`Chain`] and for [`App`].
pub trait IntoAction {
    fn into_action(self) -> Action;
}

impl<H: Handler> IntoAction for H {
    fn into_action(self) -> Action {
        Action::Handler(Box::new(self))
    }
}

impl IntoAction for Chain {
    fn into_action(self) -> Action {
        Action::Chain(self.into_handlers().into_iter().map(Entry::handler).collect())
    }
}

/// One registered handler unit.
#[derive(Debug)]
pub struct Entry {
    method: Option<Method>,
    pattern: Option<CompiledPattern>,
    prefix: bool,
    action: Action,
}

impl Entry {
    /// A verb route; `None` accepts any verb.
    pub fn route(method: Option<Method>, pattern: CompiledPattern, action: Action) -> Self {
        Self {
            method,
            pattern: Some(pattern),
            prefix: false,
            action,
        }
    }

    /// A prefix-scoped middleware entry; `None` matches every path.
    pub fn middleware(pattern: Option<CompiledPattern>, action: Action) -> Self {
        Self {
            method: None,
            pattern,
            prefix: true,
            action,
        }
    }

    /// A chain member, applied unconditionally.
    pub fn handler(handler: BoxedHandler) -> Self {
        Self {
            method: None,
            pattern: None,
            prefix: false,
            action: Action::Handler(handler),
        }
    }

    pub fn method(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    /// Label appended to the route trail when this entry matches.
    pub fn label(&self) -> Option<&str> {
        self.pattern.as_ref().and_then(CompiledPattern::label)
    }

    pub fn is_prefix(&self) -> bool {
        self.prefix
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    /// Test this entry against a request's verb and current path.
    pub fn test(&self, method: &Method, path: &str) -> Option<PathMatch> {
        if let Some(expected) = &self.method {
            if !method_matches(expected, method) {
                return None;
            }
        }

        match &self.pattern {
            Some(pattern) => pattern.captures(path),
            None => Some(PathMatch {
                matched: if self.prefix { "/" } else { "" }.to_string(),
                params: Vec::new(),
            }),
        }
    }
}

fn method_matches(expected: &Method, actual: &Method) -> bool {
    expected == actual || (actual == Method::HEAD && expected == Method::GET)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::handler::{from_sync, Flow};
    use crate::routing::pattern::compile;

    fn noop() -> Action {
        from_sync(|_, _| Ok(Flow::Next)).into_action()
    }

    #[test]
    fn test_method_constraint() {
        let entry = Entry::route(Some(Method::GET), compile("/foo", false).unwrap(), noop());

        assert!(entry.test(&Method::GET, "/foo").is_some());
        assert!(entry.test(&Method::HEAD, "/foo").is_some());
        assert!(entry.test(&Method::POST, "/foo").is_none());
        assert!(entry.test(&Method::GET, "/bar").is_none());
    }

    #[test]
    fn test_any_verb() {
        let entry = Entry::route(None, compile("/foo", false).unwrap(), noop());
        assert!(entry.test(&Method::DELETE, "/foo").is_some());
    }

    #[test]
    fn test_head_entry_only_matches_head() {
        let entry = Entry::route(Some(Method::HEAD), compile("/foo", false).unwrap(), noop());
        assert!(entry.test(&Method::HEAD, "/foo").is_some());
        assert!(entry.test(&Method::GET, "/foo").is_none());
    }

    #[test]
    fn test_unconditional_entries() {
        let root = Entry::middleware(None, noop());
        assert_eq!(root.test(&Method::PUT, "/anything").unwrap().matched, "/");
        assert!(root.label().is_none());

        let member = Entry::handler(Box::new(from_sync(|_, _| Ok(Flow::Next))));
        assert_eq!(member.test(&Method::GET, "/x").unwrap().matched, "");
        assert!(!member.is_prefix());
    }

    #[test]
    fn test_chain_becomes_unconditional_entries() {
        let chain = Chain::new()
            .then(from_sync(|_, _| Ok(Flow::Next)))
            .then(from_sync(|_, _| Ok(Flow::Halt)));

        match chain.into_action() {
            Action::Chain(entries) => {
                assert_eq!(entries.len(), 2);
                assert!(entries.iter().all(|e| e.method().is_none() && e.label().is_none()));
            }
            other => panic!("expected chain, got {:?}", other),
        }
    }
}
