//! Switchyard demo server.
//!
//! Serves a small application showing routes, prefix mounts, nested apps
//! and error handling.

use std::path::PathBuf;

use axum::http::StatusCode;
use clap::Parser;
use serde_json::json;
use tokio::net::TcpListener;

use switchyard::config::{load_config, ServerConfig};
use switchyard::lifecycle::{signals, Shutdown};
use switchyard::observability::logging;
use switchyard::{from_fn, from_sync, App, AppOptions, Flow, HandlerError, HttpServer, RouterError};

#[derive(Parser, Debug)]
#[command(name = "switchyard")]
#[command(about = "Route-matching HTTP server", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the bind address
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init(&config.observability.log_level);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        trust_proxy = ?config.app.trust_proxy,
        "Configuration loaded"
    );

    let app = demo_app(AppOptions::from(&config.app))?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();

    tokio::spawn(async move {
        signals::wait_for_signal().await;
        shutdown.trigger();
    });

    HttpServer::new(app, config).run(listener, receiver).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn demo_app(options: AppOptions) -> Result<App, RouterError> {
    let mut files = App::with_options(AppOptions::new().disable_no_match_handler());
    files.get("/*", from_sync(|req, res| {
        res.json(&json!({
            "base_url": req.base_url(),
            "file": req.params().get("wild"),
        }))?;
        Ok(Flow::Halt)
    }))?;

    let mut app = App::with_options(options);
    app.mount(from_sync(|req, res| {
        tracing::info!(
            request_id = %req.id(),
            method = %req.method(),
            url = %req.original_url(),
            ip = %req.ip(),
            "Incoming request"
        );
        res.set_header("x-request-id", req.id())?;
        Ok(Flow::Next)
    }))?
    .get("/", from_sync(|_, res| {
        res.send("switchyard is running");
        Ok(Flow::Halt)
    }))?
    .get("/health", from_sync(|_, res| {
        res.json(&json!({ "status": "ok" }))?;
        Ok(Flow::Halt)
    }))?
    .get("/users/:id", from_sync(|req, res| {
        res.json(&json!({
            "params": req.params(),
            "route": req.route(),
            "host": req.host(),
            "protocol": req.protocol(),
        }))?;
        Ok(Flow::Halt)
    }))?
    .get("/slow/:millis", from_fn(|req, res| {
        Box::pin(async move {
            let millis: u64 = req
                .params()
                .get("millis")
                .and_then(|m| m.parse().ok())
                .ok_or_else(|| HandlerError::with_status(StatusCode::BAD_REQUEST, "millis must be a number"))?;
            tokio::time::sleep(std::time::Duration::from_millis(millis.min(5_000))).await;
            res.send(format!("slept {millis}ms"));
            Ok(Flow::Halt)
        })
    }))?
    .get("/old", from_sync(|_, res| {
        res.redirect("/")?;
        Ok(Flow::Halt)
    }))?
    .mount_at("/files", files)?;

    Ok(app)
}
