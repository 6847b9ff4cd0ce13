//! WorkerHandler: keeps the running worker population aligned with demand.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use packwork_adapter::AdapterEndpoint;
use packwork_proto::{
    AppDesc, AppId, AppType, ClientId, WorkforceContainerRequest, WorkforceContainerResponse,
};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::HandlerConfig;
use crate::error::{Result, WorkforceError};

/// A connected App Container, as seen by the scheduler.
#[derive(Debug, Clone)]
pub struct AppContainerEntry {
    /// Client identifier from the handshake.
    pub id: ClientId,
    /// True once the container has reported its capability list.
    pub initialized: bool,
    /// Self-reported capability list, in report order.
    pub available_apps: Vec<AppDesc>,
    /// Endpoint for calling the container.
    pub api: Arc<AdapterEndpoint<WorkforceContainerRequest>>,
}

/// A worker the scheduler has decided to spin up.
///
/// Recorded optimistically before the `spinUp` call returns; `app_id` is
/// filled in from the container's reply.
#[derive(Debug, Clone)]
pub struct PlannedWorker {
    /// App type of the planned worker.
    pub app_type: AppType,
    /// Container asked to host it.
    pub app_container_id: ClientId,
    /// Instance id, once the container has answered.
    pub app_id: Option<AppId>,
}

/// A per-pass demand record.
#[derive(Debug, Clone)]
struct Need {
    app_type: AppType,
    fulfilled: bool,
}

/// Scheduling phase of the coalescing state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// No pass scheduled or running.
    Idle,
    /// A pass is waiting out the debounce delay.
    Scheduled,
    /// A pass is executing.
    Running,
}

#[derive(Debug)]
struct ScheduleState {
    phase: Phase,
    update_again: bool,
    terminated: bool,
}

/// The control loop that reconciles worker demand against supply.
///
/// Bursts of [`trigger_update`](WorkerHandler::trigger_update) calls coalesce
/// into a single debounced pass: a trigger in `Idle` schedules one pass;
/// triggers while a pass is scheduled or running set a flag that causes
/// exactly one further pass after the current one completes. Connect and
/// disconnect events and the periodic timer all trigger concurrently, so
/// this coalescing is what keeps redundant workers from being spun up.
pub struct WorkerHandler {
    config: HandlerConfig,
    containers: Mutex<Vec<AppContainerEntry>>,
    planned: Mutex<Vec<PlannedWorker>>,
    state: Mutex<ScheduleState>,
    passes_completed: AtomicU64,
    cancel: CancellationToken,
}

impl WorkerHandler {
    /// Creates a handler with no known containers.
    #[must_use]
    pub fn new(config: HandlerConfig) -> Self {
        Self {
            config,
            containers: Mutex::new(Vec::new()),
            planned: Mutex::new(Vec::new()),
            state: Mutex::new(ScheduleState {
                phase: Phase::Idle,
                update_again: false,
                terminated: false,
            }),
            passes_completed: AtomicU64::new(0),
            cancel: CancellationToken::new(),
        }
    }

    /// Registers a freshly connected container (not yet initialised).
    pub fn add_container(
        self: &Arc<Self>,
        id: ClientId,
        api: Arc<AdapterEndpoint<WorkforceContainerRequest>>,
    ) {
        info!(client_id = %id, "App container connected");
        self.containers.lock().push(AppContainerEntry {
            id,
            initialized: false,
            available_apps: Vec::new(),
            api,
        });
        self.trigger_update();
    }

    /// Stores a container's reported capability list and marks it
    /// initialised.
    pub fn register_available_apps(
        self: &Arc<Self>,
        container_id: &str,
        apps: Vec<AppDesc>,
    ) -> Result<()> {
        {
            let mut containers = self.containers.lock();
            let entry = containers
                .iter_mut()
                .find(|c| c.id == container_id)
                .ok_or_else(|| WorkforceError::ContainerNotFound(container_id.to_owned()))?;
            info!(client_id = %container_id, apps = apps.len(), "App container initialised");
            entry.available_apps = apps;
            entry.initialized = true;
        }
        self.trigger_update();
        Ok(())
    }

    /// Drops a disconnected container and its planned workers.
    pub fn remove_container(self: &Arc<Self>, container_id: &str) {
        let removed = {
            let mut containers = self.containers.lock();
            let before = containers.len();
            containers.retain(|c| c.id != container_id);
            before != containers.len()
        };
        if removed {
            info!(client_id = %container_id, "App container disconnected");
            self.planned
                .lock()
                .retain(|p| p.app_container_id != container_id);
            self.trigger_update();
        }
    }

    /// Requests a reconciliation pass.
    ///
    /// Safe to call from anywhere at any rate; see the type-level docs for
    /// the coalescing behaviour. After [`terminate`](Self::terminate) this
    /// is a no-op.
    pub fn trigger_update(self: &Arc<Self>) {
        let mut state = self.state.lock();
        if state.terminated {
            return;
        }
        match state.phase {
            Phase::Idle => {
                state.phase = Phase::Scheduled;
                let this = Arc::clone(self);
                tokio::spawn(async move { this.run_scheduled().await });
            }
            Phase::Scheduled | Phase::Running => state.update_again = true,
        }
    }

    /// Starts the periodic trigger.
    pub fn start_periodic_trigger(self: &Arc<Self>) {
        let this = Arc::clone(self);
        let cancel = self.cancel.clone();
        let interval = self.config.trigger_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => this.trigger_update(),
                    () = cancel.cancelled() => break,
                }
            }
        });
    }

    /// Stops the periodic trigger and turns further triggers into no-ops.
    pub fn terminate(&self) {
        self.state.lock().terminated = true;
        self.cancel.cancel();
    }

    /// Snapshot of currently planned workers.
    #[must_use]
    pub fn planned_workers(&self) -> Vec<PlannedWorker> {
        self.planned.lock().clone()
    }

    /// Snapshot of known containers.
    #[must_use]
    pub fn containers(&self) -> Vec<AppContainerEntry> {
        self.containers.lock().clone()
    }

    /// Number of completed reconciliation passes.
    #[must_use]
    pub fn passes_completed(&self) -> u64 {
        self.passes_completed.load(Ordering::Relaxed)
    }

    /// The scheduled-pass loop: debounce, run, and re-run once if triggers
    /// arrived while the pass was scheduled or running.
    async fn run_scheduled(self: Arc<Self>) {
        loop {
            tokio::time::sleep(self.config.debounce).await;

            {
                let mut state = self.state.lock();
                if state.terminated {
                    state.phase = Phase::Idle;
                    return;
                }
                state.phase = Phase::Running;
            }

            if let Err(e) = self.reconcile().await {
                warn!(error = %e, "Worker reconciliation pass failed");
            }
            self.passes_completed.fetch_add(1, Ordering::Relaxed);

            let mut state = self.state.lock();
            if state.update_again && !state.terminated {
                state.update_again = false;
                state.phase = Phase::Scheduled;
            } else {
                state.phase = Phase::Idle;
                return;
            }
        }
    }

    /// One reconciliation pass: demand list against planned supply,
    /// first-match-wins spin-up on capable containers.
    async fn reconcile(&self) -> Result<()> {
        let mut needs: Vec<Need> = self
            .config
            .needs
            .iter()
            .map(|app_type| Need {
                app_type: app_type.clone(),
                fulfilled: false,
            })
            .collect();

        {
            let planned = self.planned.lock();
            for need in &mut needs {
                if planned.iter().any(|p| p.app_type == need.app_type) {
                    need.fulfilled = true;
                }
            }
        }

        let containers: Vec<AppContainerEntry> = self
            .containers
            .lock()
            .iter()
            .filter(|c| c.initialized)
            .cloned()
            .collect();

        for need in needs.iter().filter(|n| !n.fulfilled) {
            // A worker planned earlier in this pass also counts as a have.
            if self
                .planned
                .lock()
                .iter()
                .any(|p| p.app_type == need.app_type)
            {
                continue;
            }

            'containers: for container in &containers {
                for app in &container.available_apps {
                    if app.app_type == need.app_type {
                        self.spin_up(container, &need.app_type).await?;
                        break 'containers;
                    }
                }
            }
        }

        Ok(())
    }

    /// Optimistically records a planned worker, then asks the container to
    /// spin it up. The optimistic record is rolled back on failure so the
    /// next pass re-attempts the need from scratch.
    async fn spin_up(&self, container: &AppContainerEntry, app_type: &str) -> Result<()> {
        self.planned.lock().push(PlannedWorker {
            app_type: app_type.to_owned(),
            app_container_id: container.id.clone(),
            app_id: None,
        });

        let outcome = container
            .api
            .call(WorkforceContainerRequest::SpinUp {
                app_type: app_type.to_owned(),
            })
            .await;

        match outcome {
            Ok(WorkforceContainerResponse::SpunUp { app_id }) => {
                info!(
                    client_id = %container.id,
                    app_type = %app_type,
                    app_id = %app_id,
                    "Worker spun up"
                );
                let mut planned = self.planned.lock();
                if let Some(worker) = planned.iter_mut().find(|p| {
                    p.app_container_id == container.id
                        && p.app_type == app_type
                        && p.app_id.is_none()
                }) {
                    worker.app_id = Some(app_id);
                }
                Ok(())
            }
            Ok(other) => {
                self.roll_back_plan(&container.id, app_type);
                Err(WorkforceError::UnexpectedResponse(format!("{other:?}")))
            }
            Err(e) => {
                debug!(client_id = %container.id, app_type = %app_type, "Spin-up failed");
                self.roll_back_plan(&container.id, app_type);
                Err(e.into())
            }
        }
    }

    fn roll_back_plan(&self, container_id: &str, app_type: &str) {
        let mut planned = self.planned.lock();
        if let Some(index) = planned.iter().position(|p| {
            p.app_container_id == container_id && p.app_type == app_type && p.app_id.is_none()
        }) {
            planned.remove(index);
        }
    }
}
