//! Process entry point: loads configuration, wires one instance of each
//! component, and runs the HTTP ingestion API and the notifier's
//! WebSocket listener until shutdown is requested.

use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use traceledger_api::{AppState, build_router};
use traceledger_audit::AuditService;
use traceledger_bus::{EventBus, InProcessBus};
use traceledger_core::TraceLedgerConfig;
use traceledger_notifier::{NotifierRegistry, NotifierService, NotifierState};
use traceledger_store::LogStore;
use traceledger_worker::Worker;

/// The bounded recently-seen-key set the Worker dedups ingress events
/// against. Not exposed as configuration: it is an implementation detail
/// of the idempotency window, not an operational knob.
const IDEMPOTENCY_CACHE_CAPACITY: usize = 50_000;

#[derive(Parser, Debug)]
#[command(name = "traceledger-server", about = "TraceLedger ingestion-to-audit pipeline")]
struct Cli {
    /// Path to a TOML configuration file. Environment variables prefixed
    /// `TRACELEDGER__` are layered on top regardless of whether this is set.
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = TraceLedgerConfig::load(cli.config.as_deref())?;
    info!(http_port = config.http.port, notifier_port = config.notifier.port, "starting traceledger-server");

    let store = Arc::new(LogStore::connect(&config.store.endpoint).await?);
    let bus: Arc<dyn EventBus> = Arc::new(InProcessBus::new(
        config.bus.max_deliver,
        &config.bus.backoff_schedule_secs,
        Duration::from_secs(config.bus.ack_deadline_secs),
    ));
    let audit = Arc::new(AuditService::new(config.audit.merkle_window_minutes));

    let worker = Arc::new(Worker::new(
        Arc::clone(&store),
        Arc::clone(&audit),
        Arc::clone(&bus),
        IDEMPOTENCY_CACHE_CAPACITY,
        config.retention.hot_days,
        config.retention.warm_days,
    ));
    let worker_handle = tokio::spawn({
        let worker = Arc::clone(&worker);
        async move {
            if let Err(e) = worker.run().await {
                tracing::error!(error = %e, "log worker exited");
            }
        }
    });

    let registry = Arc::new(NotifierRegistry::new(config.notifier.max_room_members));
    let notifier_service = Arc::new(NotifierService::new(Arc::clone(&registry), Arc::clone(&bus)));
    let notifier_handle = tokio::spawn({
        let notifier_service = Arc::clone(&notifier_service);
        async move {
            if let Err(e) = notifier_service.run().await {
                tracing::error!(error = %e, "notifier service exited");
            }
        }
    });

    let api_state = Arc::new(AppState { store, bus, config: config.clone() });
    let api_router = build_router(api_state);
    let api_addr = SocketAddr::from(([0, 0, 0, 0], config.http.port));
    let api_listener = tokio::net::TcpListener::bind(api_addr).await?;
    info!(%api_addr, "ingestion API listening");

    let notifier_state = Arc::new(NotifierState {
        registry,
        write_timeout: Duration::from_millis(config.notifier.write_timeout_ms),
    });
    let notifier_router = axum::Router::new()
        .route("/ws", axum::routing::get(traceledger_notifier::ws_handler))
        .with_state(notifier_state);
    let notifier_addr = SocketAddr::from(([0, 0, 0, 0], config.notifier.port));
    let notifier_listener = tokio::net::TcpListener::bind(notifier_addr).await?;
    info!(%notifier_addr, "notifier websocket listening");

    let api_server = axum::serve(api_listener, api_router.into_make_service());
    let notifier_server =
        axum::serve(notifier_listener, notifier_router.into_make_service_with_connect_info::<SocketAddr>());

    tokio::select! {
        res = api_server => { res?; }
        res = notifier_server => { res?; }
        _ = tokio::signal::ctrl_c() => { info!("received shutdown signal"); }
    }

    worker_handle.abort();
    notifier_handle.abort();
    Ok(())
}
