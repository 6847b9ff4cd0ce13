//! Packwork Workforce binary.
//!
//! Runs the hub process: the adapter listener for agents, managers and
//! containers, the worker-pool scheduler, the CPU tracker, and the status
//! API.

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use packwork_adapter::AdapterListener;
use packwork_workforce::{
    api, server, CpuTracker, Workforce, WorkerHandler, WorkforceConfig, WorkforceRegistry,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("packwork_workforce=info".parse()?),
        )
        .init();

    info!("Packwork workforce starting");

    // Load configuration
    let config: WorkforceConfig = Figment::new()
        .merge(Toml::file("workforce.toml"))
        .merge(Env::prefixed("WORKFORCE_").split("_"))
        .extract()?;

    info!(listen_addr = %config.server.listen_addr, "Configuration loaded");

    let cancel = CancellationToken::new();

    // Create registry and scheduler
    let registry = Arc::new(WorkforceRegistry::new());
    let handler = Arc::new(WorkerHandler::new(config.handler.clone()));
    let workforce = Arc::new(Workforce::new(registry.clone(), handler.clone()));
    info!(
        needs = config.handler.needs.len(),
        debounce_ms = config.handler.debounce.as_millis() as u64,
        "Worker handler initialised"
    );

    // Create CPU tracker
    let cpu = Arc::new(CpuTracker::new(config.cpu.clone()));
    cpu.start();
    info!(
        sample_interval_ms = config.cpu.sample_interval.as_millis() as u64,
        "CPU tracker started"
    );

    // Start the periodic reconciliation trigger
    handler.start_periodic_trigger();

    // Start the adapter listener and the disconnect mailbox
    let listener = AdapterListener::bind(config.server.listen_addr).await?;
    let (disconnect_tx, disconnect_rx) = mpsc::unbounded_channel();

    tokio::spawn(server::run(
        workforce.clone(),
        listener,
        disconnect_tx,
        cancel.clone(),
    ));
    tokio::spawn(server::run_disconnect_loop(
        workforce.clone(),
        disconnect_rx,
        cancel.clone(),
    ));
    info!(addr = %config.server.listen_addr, "Workforce listening");

    // Serve the status API
    let state = Arc::new(api::AppState {
        registry,
        handler: handler.clone(),
        cpu: cpu.clone(),
    });
    let app = api::router(state);

    let api_listener = TcpListener::bind(&config.api.listen_addr).await?;
    info!(addr = %config.api.listen_addr, "Status API listening");

    axum::serve(api_listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await?;

    handler.terminate();
    cpu.terminate();
    cancel.cancel();

    Ok(())
}

async fn shutdown_signal(cancel: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if result.is_ok() {
                info!("Shutdown requested");
            }
        }
        () = cancel.cancelled() => {}
    }
}
