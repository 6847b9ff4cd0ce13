//! App lifecycle backends.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use dashmap::DashMap;
use packwork_proto::{AppId, AppType, RunningApp};
use tokio::process::{Child, Command};
use tracing::{info, warn};

use crate::error::{ContainerError, Result};

/// How to start one app type.
#[derive(Debug, Clone)]
pub struct AppSpec {
    /// Executable to spawn.
    pub exec: PathBuf,
    /// Arguments passed to the executable.
    pub args: Vec<String>,
}

/// Spins app instances up and down.
#[async_trait]
pub trait AppRunner: Send + Sync {
    /// Starts an instance of the given app type; returns its id.
    async fn spin_up(&self, app_type: &str) -> Result<AppId>;

    /// Stops a running instance.
    async fn spin_down(&self, app_id: &str) -> Result<()>;

    /// Currently running instances.
    fn running_apps(&self) -> Vec<RunningApp>;
}

/// Generates an instance id in the `apptype-ulid` shape.
fn generate_app_id(app_type: &str) -> AppId {
    format!("{app_type}-{}", ulid::Ulid::new().to_string().to_lowercase())
}

/// Runs apps as child processes of the container.
pub struct ProcessRunner {
    specs: HashMap<AppType, AppSpec>,
    children: DashMap<AppId, RunningChild>,
}

struct RunningChild {
    app_type: AppType,
    child: Child,
}

impl ProcessRunner {
    /// Creates a runner for the given app specs.
    #[must_use]
    pub fn new(specs: HashMap<AppType, AppSpec>) -> Self {
        Self {
            specs,
            children: DashMap::new(),
        }
    }
}

#[async_trait]
impl AppRunner for ProcessRunner {
    async fn spin_up(&self, app_type: &str) -> Result<AppId> {
        let spec = self
            .specs
            .get(app_type)
            .ok_or_else(|| ContainerError::UnsupportedAppType(app_type.to_owned()))?;

        let child = Command::new(&spec.exec)
            .args(&spec.args)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ContainerError::Spawn(format!("{}: {e}", spec.exec.display())))?;

        let app_id = generate_app_id(app_type);
        info!(app_id = %app_id, app_type = %app_type, "App spun up");
        self.children.insert(
            app_id.clone(),
            RunningChild {
                app_type: app_type.to_owned(),
                child,
            },
        );
        Ok(app_id)
    }

    async fn spin_down(&self, app_id: &str) -> Result<()> {
        let Some((_, mut running)) = self.children.remove(app_id) else {
            return Err(ContainerError::AppNotFound(app_id.to_owned()));
        };

        if let Err(e) = running.child.kill().await {
            // The process may have exited on its own already.
            warn!(app_id = %app_id, error = %e, "Kill failed");
        }
        info!(app_id = %app_id, app_type = %running.app_type, "App spun down");
        Ok(())
    }

    fn running_apps(&self) -> Vec<RunningApp> {
        self.children
            .iter()
            .map(|entry| RunningApp {
                app_id: entry.key().clone(),
                app_type: entry.value().app_type.clone(),
            })
            .collect()
    }
}

/// In-memory runner for tests.
#[derive(Debug, Default)]
pub struct MockRunner {
    apps: DashMap<AppId, AppType>,
}

impl MockRunner {
    /// Creates an empty mock runner.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AppRunner for MockRunner {
    async fn spin_up(&self, app_type: &str) -> Result<AppId> {
        let app_id = generate_app_id(app_type);
        self.apps.insert(app_id.clone(), app_type.to_owned());
        Ok(app_id)
    }

    async fn spin_down(&self, app_id: &str) -> Result<()> {
        if self.apps.remove(app_id).is_none() {
            return Err(ContainerError::AppNotFound(app_id.to_owned()));
        }
        Ok(())
    }

    fn running_apps(&self) -> Vec<RunningApp> {
        self.apps
            .iter()
            .map(|entry| RunningApp {
                app_id: entry.key().clone(),
                app_type: entry.value().clone(),
            })
            .collect()
    }
}
