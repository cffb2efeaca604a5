//! rps-daemon entry point.
//!
//! Thin on purpose: load configuration, set up tracing, seed the store, start
//! the controller workers and serve the HTTP API until ctrl-c.

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use clap::Parser;
use rps_config::{
    load_layered_yaml, report_unused_keys, ConfigConsumer, ControllerConfig, UnusedKeyPolicy,
};
use rps_daemon::{
    controller::{Controller, ControllerSettings, ReconcileCounters},
    queue::{Backoff, WorkQueue},
    routes, state,
};
use rps_reconcile::{RootPolicyLocks, RootPolicyStatusReconciler};
use rps_store::{load_object_set, InMemoryStore, ObjectStore};
use tokio::sync::watch;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

#[derive(Parser, Debug)]
#[command(name = "rps-daemon", version, about = "Root policy status controller")]
struct Args {
    /// Layered YAML config files; later files override earlier ones.
    #[arg(long = "config", value_name = "PATH")]
    config: Vec<String>,

    /// Object fixture to seed the store with (overrides store.objects_path).
    #[arg(long, value_name = "PATH")]
    objects: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    let args = Args::parse();

    let paths: Vec<&str> = args.config.iter().map(String::as_str).collect();
    let loaded = load_layered_yaml(&paths).context("failed to load configuration")?;
    let cfg: ControllerConfig = loaded.controller()?;

    init_tracing(&cfg.log.filter);
    info!(config_hash = %loaded.config_hash, "configuration loaded");

    let unused = report_unused_keys(
        ConfigConsumer::Daemon,
        &loaded.config_json,
        UnusedKeyPolicy::Warn,
    )?;
    for ptr in &unused.unused_leaf_pointers {
        warn!(key = %ptr, "unused config key");
    }

    let store = Arc::new(match args.objects.as_ref().or(cfg.store.objects_path.as_ref()) {
        Some(path) => {
            info!(path = %path.display(), "seeding the object store");
            InMemoryStore::from_objects(load_object_set(path)?)
        }
        None => InMemoryStore::new(),
    });
    let dyn_store: Arc<dyn ObjectStore> = store.clone();

    let locks = Arc::new(RootPolicyLocks::new());
    let reconciler = Arc::new(RootPolicyStatusReconciler::with_store(
        Arc::clone(&dyn_store),
        locks,
    ));
    let queue = Arc::new(WorkQueue::new(Backoff::new(
        cfg.retry_base_delay(),
        cfg.retry_max_delay(),
    )));
    let counters = Arc::new(ReconcileCounters::default());

    let (stop_tx, stop_rx) = watch::channel(false);
    let controller = Controller::new(
        reconciler,
        dyn_store,
        Arc::clone(&queue),
        Arc::clone(&counters),
        ControllerSettings::from(&cfg),
    );
    let controller_task = tokio::spawn(controller.run(stop_rx));

    let shared = Arc::new(state::AppState::new(store, queue, counters));
    let app = routes::build_router(shared)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = match bind_addr_from_env() {
        Some(addr) => addr,
        None => cfg.bind_addr()?,
    };
    info!("rps-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    let _ = stop_tx.send(true);
    controller_task.await.context("controller task failed")?;
    Ok(())
}

fn init_tracing(default_filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("RPS_DAEMON_ADDR").ok()?.parse().ok()
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
