//! Packwork worker agent binary.
//!
//! Connects to the Workforce, watches the package folder, and sweeps the
//! delayed-removal ledger.

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use packwork_worker::{
    agent, AgentClient, FileWatcher, RemovalLedger, WatchEvent, WorkerConfig,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("packwork_worker=info".parse()?),
        )
        .init();

    info!("Packwork worker starting");

    // Load configuration
    let config: WorkerConfig = Figment::new()
        .merge(Toml::file("worker.toml"))
        .merge(Env::prefixed("WORKER_").split("_"))
        .extract()?;

    let client_id = config
        .workforce
        .client_id
        .clone()
        .unwrap_or_else(agent::generate_client_id);
    info!(client_id = %client_id, workforce = %config.workforce.addr, "Configuration loaded");

    // Connect to the Workforce
    let client = AgentClient::connect(config.workforce.addr, client_id).await?;
    info!(
        managers = client.expectation_managers().len(),
        "Connected to workforce"
    );

    // Make sure the package folder exists before watching it
    tokio::fs::create_dir_all(&config.watcher.dir).await?;

    // Watch the package folder
    let (watcher, mut events) =
        FileWatcher::init(&config.watcher.dir, config.watcher.stability_threshold).await?;
    info!(dir = %config.watcher.dir.display(), "Watching package folder");

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                WatchEvent::File(event) => {
                    // Stable change signal for the expectation layer.
                    debug!(kind = ?event.kind, path = %event.path.display(), "File event");
                }
                WatchEvent::Error(message) => warn!(error = %message, "Watcher error"),
            }
        }
    });

    // Sweep the removal ledger
    let ledger = RemovalLedger::new(&config.watcher.dir);
    let sweep_interval = config.removal.sweep_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        loop {
            ticker.tick().await;
            match ledger.remove_due().await {
                Ok(0) => {}
                Ok(count) => info!(count, "Swept due package removals"),
                Err(e) => warn!(error = %e, "Removal sweep failed"),
            }
        }
    });

    // Run until the Workforce connection is lost; the process supervisor
    // restarts us for reconnection.
    client.closed().await;
    warn!("Workforce connection lost, shutting down");
    watcher.terminate();

    Ok(())
}
