//! Packwork app container binary.
//!
//! Connects to the Workforce as an `appContainer`, reports its capability
//! list, and serves spin-up requests until the connection is lost.

use std::collections::HashMap;
use std::sync::Arc;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use packwork_adapter::connect;
use packwork_proto::{
    ClientType, ContainerWorkforceRequest, Hello, WorkforceContainerRequest,
};
use packwork_container::{AppSpec, ContainerConfig, ContainerService, ProcessRunner};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("packwork_container=info".parse()?),
        )
        .init();

    info!("Packwork app container starting");

    // Load configuration
    let config: ContainerConfig = Figment::new()
        .merge(Toml::file("container.toml"))
        .merge(Env::prefixed("CONTAINER_").split("_"))
        .extract()?;

    let client_id = config.workforce.client_id.clone().unwrap_or_else(|| {
        format!("container-{}", ulid::Ulid::new().to_string().to_lowercase())
    });
    info!(client_id = %client_id, workforce = %config.workforce.addr, "Configuration loaded");

    // Build the runner from the configured app specs
    let specs: HashMap<String, AppSpec> = config
        .apps
        .iter()
        .map(|app| {
            (
                app.app_type.clone(),
                AppSpec {
                    exec: app.exec.clone(),
                    args: app.args.clone(),
                },
            )
        })
        .collect();
    let runner = Arc::new(ProcessRunner::new(specs));
    let available_apps: Vec<_> = config.apps.iter().map(|app| app.to_desc()).collect();
    let service = Arc::new(ContainerService::new(runner, available_apps.clone()));

    // Connect and report capabilities
    let endpoint = connect::<ContainerWorkforceRequest, WorkforceContainerRequest>(
        config.workforce.addr,
        Hello::new(client_id, ClientType::AppContainer),
        service,
    )
    .await?;

    endpoint
        .call(ContainerWorkforceRequest::RegisterAvailableApps {
            apps: available_apps,
        })
        .await?;
    info!(apps = config.apps.len(), "Capabilities registered");

    // Serve until the Workforce connection is lost; the process supervisor
    // restarts us for reconnection.
    endpoint.closed().await;
    warn!("Workforce connection lost, shutting down");

    Ok(())
}
