//! The Workforce service: connection lifecycle and manager discovery.

use std::sync::Arc;

use async_trait::async_trait;
use packwork_adapter::{AdapterEndpoint, Disconnect, MethodError, MethodHandler};
use packwork_proto::{
    AgentWorkforceRequest, AgentWorkforceResponse, ClientId, ClientType,
    ContainerWorkforceRequest, ContainerWorkforceResponse, ManagerInfo, ManagerWorkforceRequest,
    ManagerWorkforceResponse, WorkforceAgentRequest, WorkforceContainerRequest,
    WorkforceManagerRequest,
};
use tracing::{info, warn};

use crate::handler::WorkerHandler;
use crate::registry::{
    ExpectationManagerEntry, UrlRegistration, WorkerAgentEntry, WorkforceRegistry,
};

/// The hub: tracks connected parties and brokers expectation-manager
/// discoverability.
pub struct Workforce {
    registry: Arc<WorkforceRegistry>,
    handler: Arc<WorkerHandler>,
}

impl Workforce {
    /// Creates a Workforce around a registry and a worker handler.
    #[must_use]
    pub fn new(registry: Arc<WorkforceRegistry>, handler: Arc<WorkerHandler>) -> Self {
        Self { registry, handler }
    }

    /// The client registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<WorkforceRegistry> {
        &self.registry
    }

    /// The worker-pool scheduler.
    #[must_use]
    pub fn handler(&self) -> &Arc<WorkerHandler> {
        &self.handler
    }

    /// Takes a freshly connected worker agent into the registry.
    pub fn add_worker_agent(
        &self,
        id: ClientId,
        api: Arc<AdapterEndpoint<WorkforceAgentRequest>>,
    ) {
        self.registry.add_worker_agent(WorkerAgentEntry { id, api });
    }

    /// Takes a freshly connected expectation manager into the registry.
    ///
    /// The manager is not discoverable until it registers a URL.
    pub fn add_expectation_manager(
        &self,
        id: ClientId,
        api: Arc<AdapterEndpoint<WorkforceManagerRequest>>,
    ) {
        self.registry.add_manager(ExpectationManagerEntry {
            id,
            api,
            url: None,
        });
    }

    /// Takes a freshly connected app container into the scheduler.
    pub fn add_app_container(
        &self,
        id: ClientId,
        api: Arc<AdapterEndpoint<WorkforceContainerRequest>>,
    ) {
        self.handler.add_container(id, api);
    }

    /// Registers (or re-registers) a manager's URL and announces the
    /// change to every connected worker agent.
    pub async fn register_expectation_manager(&self, manager_id: &str, url: &str) {
        match self.registry.set_manager_url(manager_id, url) {
            UrlRegistration::Changed => {
                info!(manager_id = %manager_id, url = %url, "Expectation manager registered");
                self.announce_available(manager_id, url).await;
            }
            UrlRegistration::Unchanged => {
                info!(manager_id = %manager_id, "Expectation manager re-registered unchanged");
            }
            UrlRegistration::Unknown => {
                warn!(manager_id = %manager_id, "Registration from unknown expectation manager");
            }
        }
    }

    /// Withdraws a manager and announces the loss to every connected
    /// worker agent.
    pub async fn remove_expectation_manager(&self, manager_id: &str) {
        if self.registry.clear_manager_url(manager_id) {
            info!(manager_id = %manager_id, "Expectation manager removed");
            self.announce_gone(manager_id).await;
        }
    }

    /// All managers with a known URL.
    #[must_use]
    pub fn expectation_manager_list(&self) -> Vec<ManagerInfo> {
        self.registry.manager_list()
    }

    /// Reacts to a connection loss.
    pub async fn handle_disconnect(&self, disconnect: Disconnect) {
        match disconnect.client_type {
            ClientType::WorkerAgent => {
                self.registry.remove_worker_agent(&disconnect.client_id);
            }
            ClientType::ExpectationManager => {
                if let Some(entry) = self.registry.remove_manager(&disconnect.client_id) {
                    if entry.url.is_some() {
                        self.announce_gone(&disconnect.client_id).await;
                    }
                }
            }
            ClientType::AppContainer => {
                self.handler.remove_container(&disconnect.client_id);
            }
            ClientType::NotApplicable => {}
        }
    }

    /// Pushes `expectationManagerAvailable` to every connected agent.
    ///
    /// Announcements go out sequentially; one agent's failure is logged and
    /// neither blocks the remaining agents nor surfaces to the registering
    /// manager.
    async fn announce_available(&self, manager_id: &str, url: &str) {
        for agent in self.registry.worker_agents() {
            let result = agent
                .api
                .call(WorkforceAgentRequest::ExpectationManagerAvailable {
                    manager_id: manager_id.to_owned(),
                    url: url.to_owned(),
                })
                .await;
            if let Err(e) = result {
                warn!(
                    client_id = %agent.id,
                    manager_id = %manager_id,
                    error = %e,
                    "Failed to announce expectation manager"
                );
            }
        }
    }

    /// Pushes `expectationManagerGone` to every connected agent.
    async fn announce_gone(&self, manager_id: &str) {
        for agent in self.registry.worker_agents() {
            let result = agent
                .api
                .call(WorkforceAgentRequest::ExpectationManagerGone {
                    manager_id: manager_id.to_owned(),
                })
                .await;
            if let Err(e) = result {
                warn!(
                    client_id = %agent.id,
                    manager_id = %manager_id,
                    error = %e,
                    "Failed to announce expectation manager loss"
                );
            }
        }
    }
}

/// Workforce surface served to worker agents.
pub struct AgentSurface {
    workforce: Arc<Workforce>,
}

impl AgentSurface {
    /// Creates the surface.
    #[must_use]
    pub fn new(workforce: Arc<Workforce>) -> Self {
        Self { workforce }
    }
}

#[async_trait]
impl MethodHandler for AgentSurface {
    type Request = AgentWorkforceRequest;

    async fn handle(
        &self,
        request: AgentWorkforceRequest,
    ) -> Result<AgentWorkforceResponse, MethodError> {
        match request {
            AgentWorkforceRequest::GetExpectationManagerList => {
                Ok(AgentWorkforceResponse::ExpectationManagerList(
                    self.workforce.expectation_manager_list(),
                ))
            }
        }
    }
}

/// Workforce surface served to expectation managers.
pub struct ManagerSurface {
    workforce: Arc<Workforce>,
}

impl ManagerSurface {
    /// Creates the surface.
    #[must_use]
    pub fn new(workforce: Arc<Workforce>) -> Self {
        Self { workforce }
    }
}

#[async_trait]
impl MethodHandler for ManagerSurface {
    type Request = ManagerWorkforceRequest;

    async fn handle(
        &self,
        request: ManagerWorkforceRequest,
    ) -> Result<ManagerWorkforceResponse, MethodError> {
        match request {
            ManagerWorkforceRequest::RegisterExpectationManager { manager_id, url } => {
                self.workforce
                    .register_expectation_manager(&manager_id, &url)
                    .await;
                Ok(ManagerWorkforceResponse::Done)
            }
            ManagerWorkforceRequest::RemoveExpectationManager { manager_id } => {
                self.workforce.remove_expectation_manager(&manager_id).await;
                Ok(ManagerWorkforceResponse::Done)
            }
        }
    }
}

/// Workforce surface served to app containers.
pub struct ContainerSurface {
    workforce: Arc<Workforce>,
    container_id: ClientId,
}

impl ContainerSurface {
    /// Creates the surface for one connected container.
    #[must_use]
    pub fn new(workforce: Arc<Workforce>, container_id: ClientId) -> Self {
        Self {
            workforce,
            container_id,
        }
    }
}

#[async_trait]
impl MethodHandler for ContainerSurface {
    type Request = ContainerWorkforceRequest;

    async fn handle(
        &self,
        request: ContainerWorkforceRequest,
    ) -> Result<ContainerWorkforceResponse, MethodError> {
        match request {
            ContainerWorkforceRequest::RegisterAvailableApps { apps } => {
                self.workforce
                    .handler()
                    .register_available_apps(&self.container_id, apps)
                    .map_err(MethodError::new)?;
                Ok(ContainerWorkforceResponse::Done)
            }
        }
    }
}
