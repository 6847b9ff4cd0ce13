//! The Worker Agent's connection to the Workforce.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use packwork_adapter::{AdapterEndpoint, MethodError, MethodHandler};
use packwork_proto::{
    AgentWorkforceRequest, AgentWorkforceResponse, ClientId, ClientType, Hello, ManagerId,
    ManagerInfo, WorkforceAgentRequest, WorkforceAgentResponse,
};
use tracing::info;

use crate::error::Result;

/// Client side of the Workforce connection.
///
/// Maintains the agent's view of discoverable expectation managers: push
/// announcements from the Workforce and the pull query on connect both
/// converge on the same map, so agents that connect late see the same
/// managers as agents that were present for the announcements.
pub struct AgentClient {
    endpoint: AdapterEndpoint<AgentWorkforceRequest>,
    managers: Arc<DashMap<ManagerId, String>>,
}

impl AgentClient {
    /// Connects to the Workforce and pulls the current manager list.
    pub async fn connect(addr: SocketAddr, client_id: ClientId) -> Result<Self> {
        let managers: Arc<DashMap<ManagerId, String>> = Arc::new(DashMap::new());
        let surface = Arc::new(AnnouncementSurface {
            managers: managers.clone(),
        });

        let endpoint = packwork_adapter::connect::<AgentWorkforceRequest, WorkforceAgentRequest>(
            addr,
            Hello::new(client_id, ClientType::WorkerAgent),
            surface,
        )
        .await?;

        let client = Self { endpoint, managers };
        client.refresh_managers().await?;
        Ok(client)
    }

    /// Re-pulls the manager list from the Workforce.
    pub async fn refresh_managers(&self) -> Result<()> {
        let response = self
            .endpoint
            .call(AgentWorkforceRequest::GetExpectationManagerList)
            .await?;
        let AgentWorkforceResponse::ExpectationManagerList(list) = response;

        for manager in list {
            self.managers.insert(manager.id, manager.url);
        }
        Ok(())
    }

    /// The currently known expectation managers.
    #[must_use]
    pub fn expectation_managers(&self) -> Vec<ManagerInfo> {
        self.managers
            .iter()
            .map(|entry| ManagerInfo {
                id: entry.key().clone(),
                url: entry.value().clone(),
            })
            .collect()
    }

    /// Waits until the Workforce connection is gone.
    pub async fn closed(&self) {
        self.endpoint.closed().await;
    }
}

/// The announcement surface this agent serves to the Workforce.
struct AnnouncementSurface {
    managers: Arc<DashMap<ManagerId, String>>,
}

#[async_trait]
impl MethodHandler for AnnouncementSurface {
    type Request = WorkforceAgentRequest;

    async fn handle(
        &self,
        request: WorkforceAgentRequest,
    ) -> std::result::Result<WorkforceAgentResponse, MethodError> {
        match request {
            WorkforceAgentRequest::ExpectationManagerAvailable { manager_id, url } => {
                info!(manager_id = %manager_id, url = %url, "Expectation manager available");
                self.managers.insert(manager_id, url);
            }
            WorkforceAgentRequest::ExpectationManagerGone { manager_id } => {
                info!(manager_id = %manager_id, "Expectation manager gone");
                self.managers.remove(&manager_id);
            }
        }
        Ok(WorkforceAgentResponse::Done)
    }
}

/// Generates a worker client id in the `role-ulid` shape.
#[must_use]
pub fn generate_client_id() -> ClientId {
    format!("worker-{}", ulid::Ulid::new().to_string().to_lowercase())
}
