//! The application: an ordered entry list plus its fallbacks.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, StatusCode};
use futures_util::future::BoxFuture;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::app::options::AppOptions;
use crate::config::ServerConfig;
use crate::dispatch::{self, DispatchResult, Outcome};
use crate::http::request::ensure_leading_slash;
use crate::http::{context, HttpServer, Request, Response};
use crate::lifecycle::{signals, Shutdown};
use crate::routing::{pattern, Action, Entry, IntoAction, RoutePath, RouterError};

/// A routing application.
///
/// Entries run in registration order. An `App` can be mounted inside
/// another one, where it keeps its own fallbacks.
#[derive(Debug, Default)]
pub struct App {
    entries: Vec<Entry>,
    options: AppOptions,
}

/// Generates one registration method per HTTP verb.
macro_rules! verb_routes {
    ($($name:ident => $method:ident),* $(,)?) => {
        impl App {
            $(
                #[doc = concat!("Register a `", stringify!($method), "` route.")]
                pub fn $name(
                    &mut self,
                    path: impl Into<RoutePath>,
                    action: impl IntoAction,
                ) -> Result<&mut Self, RouterError> {
                    self.route(Some(Method::$method), path, action)
                }
            )*
        }
    };
}

verb_routes! {
    get => GET,
    post => POST,
    put => PUT,
    delete => DELETE,
    patch => PATCH,
    head => HEAD,
    options => OPTIONS,
    connect => CONNECT,
    trace => TRACE,
}

impl IntoAction for App {
    fn into_action(self) -> Action {
        Action::App(Arc::new(self))
    }
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: AppOptions) -> Self {
        Self {
            entries: Vec::new(),
            options,
        }
    }

    pub fn settings(&self) -> &AppOptions {
        &self.options
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Register a route for any verb.
    pub fn all(
        &mut self,
        path: impl Into<RoutePath>,
        action: impl IntoAction,
    ) -> Result<&mut Self, RouterError> {
        self.route(None, path, action)
    }

    /// Register a route; `None` accepts any verb.
    pub fn route(
        &mut self,
        method: Option<Method>,
        path: impl Into<RoutePath>,
        action: impl IntoAction,
    ) -> Result<&mut Self, RouterError> {
        let path = path.into();
        let description = describe(method.as_ref(), &path);
        let action = action.into_action();

        match &action {
            Action::App(_) => return Err(RouterError::InvalidHandler { route: description }),
            Action::Chain(entries) if entries.is_empty() => {
                return Err(RouterError::EmptyChain { route: description })
            }
            _ => {}
        }

        let compiled = pattern::compile(path, false)?;
        tracing::debug!(route = %description, "Route registered");
        self.entries.push(Entry::route(method, compiled, action));
        Ok(self)
    }

    /// Mount a handler, chain or nested app for every path.
    pub fn mount(&mut self, action: impl IntoAction) -> Result<&mut Self, RouterError> {
        self.mount_at("/", action)
    }

    /// Mount a handler, chain or nested app under a path prefix.
    ///
    /// Inside the mount the prefix is moved from `path`/`url` onto
    /// `base_url`.
    pub fn mount_at(&mut self, path: &str, action: impl IntoAction) -> Result<&mut Self, RouterError> {
        let path = ensure_leading_slash(path);
        let action = action.into_action();

        if matches!(&action, Action::Chain(entries) if entries.is_empty()) {
            return Err(RouterError::EmptyChain {
                route: format!("USE {path}"),
            });
        }

        let compiled = if path == "/" {
            None
        } else {
            Some(pattern::compile(path.as_str(), true)?)
        };

        tracing::debug!(prefix = %path, action = ?action, "Middleware mounted");
        self.entries.push(Entry::middleware(compiled, action));
        Ok(self)
    }

    /// Run this app's entries, then its fallbacks.
    ///
    /// Returns `Exhausted` only when nothing finished the response and the
    /// no-match handler is disabled; returns `Err` only when the error
    /// handler is disabled.
    pub fn handle<'a>(&'a self, req: &'a mut Request, res: &'a mut Response) -> BoxFuture<'a, DispatchResult> {
        Box::pin(async move {
            context::attach(self.options.trusts_proxy(), req);

            match dispatch::dispatch(&self.entries, req, res).await {
                Ok(Outcome::Exhausted) => match self.options.get_no_match_handler() {
                    Some(no_match) => {
                        no_match(req, res);
                        Ok(Outcome::Halted)
                    }
                    None => Ok(Outcome::Exhausted),
                },
                Ok(Outcome::Halted) => Ok(Outcome::Halted),
                Err(err) => match self.options.get_error_handler() {
                    Some(on_error) => {
                        on_error(err, req, res);
                        Ok(Outcome::Halted)
                    }
                    None => Err(err),
                },
            }
        })
    }

    /// Answer one transport request from `peer`.
    pub async fn respond(&self, request: axum::http::Request<Body>, peer: SocketAddr) -> axum::response::Response {
        let mut req = Request::from_http(request, peer);
        let mut res = Response::new();

        match self.handle(&mut req, &mut res).await {
            Ok(Outcome::Halted) => {
                if !res.is_finished() {
                    tracing::warn!(request_id = %req.id(), "Handler stopped without sending a response");
                }
            }
            Ok(Outcome::Exhausted) => {
                if !res.is_finished() {
                    res.status(StatusCode::NOT_FOUND).end();
                }
            }
            Err(err) => {
                tracing::error!(request_id = %req.id(), error = %err, "Unhandled handler error");
                res = Response::new();
                res.send_status(StatusCode::INTERNAL_SERVER_ERROR);
            }
        }

        tracing::debug!(
            request_id = %req.id(),
            status = res.status_code().as_u16(),
            route = %req.route(),
            "Request completed"
        );

        res.into_http()
    }

    /// Bind `addr` and serve until Ctrl-C or SIGTERM.
    pub async fn listen(self, addr: &str) -> Result<(), std::io::Error> {
        let listener = TcpListener::bind(addr).await?;
        let shutdown = Shutdown::new();
        let receiver = shutdown.subscribe();

        tokio::spawn(async move {
            signals::wait_for_signal().await;
            shutdown.trigger();
        });

        self.serve(listener, receiver).await
    }

    /// Serve an already bound listener until `shutdown` fires.
    pub async fn serve(self, listener: TcpListener, shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        HttpServer::new(self, ServerConfig::default())
            .run(listener, shutdown)
            .await
    }
}

fn describe(method: Option<&Method>, path: &RoutePath) -> String {
    let verb = method.map(Method::as_str).unwrap_or("ALL");
    match path {
        RoutePath::Pattern(pattern) => format!("{verb} {pattern}"),
        RoutePath::Regex(regex) => format!("{verb} {}", regex.as_str()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::dispatch::{from_fn, from_sync, Chain, Flow, HandlerError};

    async fn run(app: &App, method: Method, url: &str) -> (Request, Response, DispatchResult) {
        let mut req = Request::new(method, url);
        let mut res = Response::new();
        let outcome = app.handle(&mut req, &mut res).await;
        (req, res, outcome)
    }

    fn text(res: &Response) -> String {
        res.body()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_verb_routes() {
        let mut app = App::new();
        app.get("/thing", from_sync(|_, res| {
            res.send("get");
            Ok(Flow::Halt)
        }))
        .unwrap()
        .post("/thing", from_sync(|_, res| {
            res.send("post");
            Ok(Flow::Halt)
        }))
        .unwrap()
        .all("/any", from_sync(|req, res| {
            res.send(req.method().as_str().to_string());
            Ok(Flow::Halt)
        }))
        .unwrap();

        assert_eq!(text(&run(&app, Method::GET, "/thing").await.1), "get");
        assert_eq!(text(&run(&app, Method::POST, "/thing").await.1), "post");
        assert_eq!(text(&run(&app, Method::PATCH, "/any").await.1), "PATCH");

        let (_, res, _) = run(&app, Method::PUT, "/thing").await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
        assert!(res.body().is_none());
    }

    #[tokio::test]
    async fn test_route_and_mount_prefix_semantics() {
        let mut app = App::new();
        app.get("/foo", from_sync(|_, _| Ok(Flow::Next)))
            .unwrap()
            .mount_at("/foo", from_sync(|_, _| Ok(Flow::Next)))
            .unwrap();

        for url in ["/foo", "/foo/", "/foo/bar"] {
            let (_, res, _) = run(&app, Method::GET, url).await;
            assert_eq!(res.status_code(), StatusCode::NOT_FOUND, "{url}");
        }
    }

    #[tokio::test]
    async fn test_mount_without_leading_slash() {
        let mut app = App::new();
        app.mount_at("api", from_sync(|req, res| {
            res.send(req.base_url().to_string());
            Ok(Flow::Halt)
        }))
        .unwrap();

        assert_eq!(text(&run(&app, Method::GET, "/api/users").await.1), "/api");
    }

    #[tokio::test]
    async fn test_nested_app_fall_through() {
        let mut sub = App::with_options(AppOptions::new().disable_no_match_handler());
        sub.get("/known", from_sync(|req, res| {
            res.send(format!("{} {}", req.base_url(), req.route()));
            Ok(Flow::Halt)
        }))
        .unwrap();

        let mut app = App::new();
        app.mount_at("/sub", sub)
            .unwrap()
            .get("/sub/unknown", from_sync(|req, res| {
                res.send(format!("outer {}", req.route()));
                Ok(Flow::Halt)
            }))
            .unwrap();

        assert_eq!(text(&run(&app, Method::GET, "/sub/known").await.1), "/sub /sub/known");
        assert_eq!(text(&run(&app, Method::GET, "/sub/unknown").await.1), "outer /sub/unknown");
    }

    #[tokio::test]
    async fn test_nested_app_own_not_found() {
        let mut sub = App::with_options(AppOptions::new().no_match_handler(|_, res| {
            res.status(StatusCode::GONE).send("sub says gone");
        }));
        sub.get("/known", from_sync(|_, _| Ok(Flow::Halt))).unwrap();

        let mut app = App::new();
        app.mount_at("/sub", sub).unwrap();

        let (_, res, outcome) = run(&app, Method::GET, "/sub/missing").await;
        assert_eq!(outcome.unwrap(), Outcome::Halted);
        assert_eq!(res.status_code(), StatusCode::GONE);
        assert_eq!(text(&res), "sub says gone");
    }

    #[tokio::test]
    async fn test_errors_bubble_to_nearest_handler() {
        let outer_calls = Arc::new(AtomicUsize::new(0));
        let seen = outer_calls.clone();

        let mut sub = App::with_options(AppOptions::new().disable_error_handler());
        sub.get("/fail", from_fn(|_, _| {
            Box::pin(async move {
                tokio::task::yield_now().await;
                Err(HandlerError::with_status(StatusCode::SERVICE_UNAVAILABLE, "maintenance"))
            })
        }))
        .unwrap();

        let mut app = App::with_options(AppOptions::new().error_handler(move |err, _, res| {
            seen.fetch_add(1, Ordering::SeqCst);
            res.status(err.status()).send(err.to_string());
        }));
        app.mount_at("/sub", sub).unwrap();

        let (_, res, outcome) = run(&app, Method::GET, "/sub/fail").await;
        assert_eq!(outcome.unwrap(), Outcome::Halted);
        assert_eq!(res.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(text(&res), "maintenance");
        assert_eq!(outer_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sub_app_error_handler_wins() {
        let mut sub = App::with_options(AppOptions::new().error_handler(|_, _, res| {
            res.status(StatusCode::BAD_REQUEST).send("handled below");
        }));
        sub.get("/fail", from_sync(|_, _| Err(HandlerError::other("nope")))).unwrap();

        let mut app = App::with_options(AppOptions::new().error_handler(|_, _, res| {
            res.send("handled above");
        }));
        app.mount_at("/sub", sub).unwrap();

        let (_, res, _) = run(&app, Method::GET, "/sub/fail").await;
        assert_eq!(text(&res), "handled below");
    }

    #[tokio::test]
    async fn test_default_error_handler_uses_status() {
        let mut app = App::new();
        app.get("/teapot", from_sync(|_, _| {
            Err(HandlerError::with_status(StatusCode::IM_A_TEAPOT, "brewing"))
        }))
        .unwrap()
        .get("/boom", from_sync(|_, _| -> crate::dispatch::HandlerResult { panic!("boom") }))
        .unwrap();

        let (_, res, _) = run(&app, Method::GET, "/teapot").await;
        assert_eq!(res.status_code(), StatusCode::IM_A_TEAPOT);

        let (_, res, _) = run(&app, Method::GET, "/boom").await;
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(text(&res), "Internal Server Error");
    }

    #[tokio::test]
    async fn test_disabled_fallbacks_surface_to_caller() {
        let options = AppOptions::new().disable_no_match_handler().disable_error_handler();
        let mut app = App::with_options(options);
        app.get("/fail", from_sync(|_, _| Err(HandlerError::other("raw")))).unwrap();

        let (_, _, outcome) = run(&app, Method::GET, "/nothing").await;
        assert_eq!(outcome.unwrap(), Outcome::Exhausted);

        let (_, _, outcome) = run(&app, Method::GET, "/fail").await;
        assert_eq!(outcome.unwrap_err().to_string(), "raw");
    }

    #[tokio::test]
    async fn test_chains() {
        let mut app = App::new();
        app.get(
            "/chained",
            Chain::new()
                .then(from_sync(|req, _| {
                    req.params_mut().insert("user", "alice");
                    Ok(Flow::Next)
                }))
                .then(from_sync(|req, res| {
                    res.send(req.params().get("user").unwrap_or_default().to_string());
                    Ok(Flow::Halt)
                })),
        )
        .unwrap();

        assert_eq!(text(&run(&app, Method::GET, "/chained").await.1), "alice");
    }

    #[test]
    fn test_registration_errors() {
        let mut app = App::new();

        let err = app.get("/sub", App::new()).unwrap_err();
        assert!(matches!(err, RouterError::InvalidHandler { .. }));
        assert_eq!(
            err.to_string(),
            "invalid handler for GET /sub: nested applications can only be mounted"
        );

        assert!(matches!(app.post("/x", Chain::new()), Err(RouterError::EmptyChain { .. })));
        assert!(matches!(app.mount_at("/x", Chain::new()), Err(RouterError::EmptyChain { .. })));
        assert!(matches!(app.get("/*/*", from_sync(|_, _| Ok(Flow::Next))), Err(RouterError::Pattern { .. })));
        assert!(app.entries().is_empty());
    }

    #[tokio::test]
    async fn test_trust_proxy_option() {
        let mut app = App::with_options(AppOptions::new().trust_proxy(false));
        app.get("/ip", from_sync(|req, res| {
            res.send(req.ip().to_string());
            Ok(Flow::Halt)
        }))
        .unwrap();

        let mut req = Request::new(Method::GET, "/ip").with_header("x-forwarded-for", "1.2.3.4");
        let mut res = Response::new();
        app.handle(&mut req, &mut res).await.unwrap();
        assert_eq!(text(&res), "127.0.0.1");
    }
}
