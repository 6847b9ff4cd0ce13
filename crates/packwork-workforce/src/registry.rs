//! Client registry: connected worker agents and expectation managers.

use std::sync::Arc;

use dashmap::DashMap;
use packwork_adapter::AdapterEndpoint;
use packwork_proto::{ClientId, ManagerInfo, WorkforceAgentRequest, WorkforceManagerRequest};
use tracing::{debug, info};

/// A connected Worker Agent.
#[derive(Debug, Clone)]
pub struct WorkerAgentEntry {
    /// Client identifier from the handshake.
    pub id: ClientId,
    /// Endpoint for calling the agent's announcement surface.
    pub api: Arc<AdapterEndpoint<WorkforceAgentRequest>>,
}

/// A connected Expectation Manager.
///
/// Until `url` is set via `registerExpectationManager`, the manager is not
/// yet discoverable by worker agents.
#[derive(Debug, Clone)]
pub struct ExpectationManagerEntry {
    /// Client identifier from the handshake.
    pub id: ClientId,
    /// Endpoint for calling the manager.
    pub api: Arc<AdapterEndpoint<WorkforceManagerRequest>>,
    /// Registered URL, once discoverable.
    pub url: Option<String>,
}

/// Outcome of a manager URL registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlRegistration {
    /// First registration or a different URL; agents must be told.
    Changed,
    /// Same URL as before; nothing to announce.
    Unchanged,
    /// No connected manager with that id.
    Unknown,
}

/// Tracks all connected parties, keyed by client id.
///
/// Entries are created when a client connects and removed when it
/// disconnects; the accessors keep that lifecycle atomic per entry.
#[derive(Debug, Default)]
pub struct WorkforceRegistry {
    worker_agents: DashMap<ClientId, WorkerAgentEntry>,
    managers: DashMap<ClientId, ExpectationManagerEntry>,
}

impl WorkforceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a worker agent on connect.
    pub fn add_worker_agent(&self, entry: WorkerAgentEntry) {
        info!(client_id = %entry.id, "Worker agent connected");
        self.worker_agents.insert(entry.id.clone(), entry);
    }

    /// Removes a worker agent on disconnect.
    pub fn remove_worker_agent(&self, id: &str) -> Option<WorkerAgentEntry> {
        let removed = self.worker_agents.remove(id).map(|(_, entry)| entry);
        if removed.is_some() {
            info!(client_id = %id, "Worker agent disconnected");
        } else {
            debug!(client_id = %id, "Disconnect for unknown worker agent");
        }
        removed
    }

    /// Snapshot of connected worker agents, for sequential broadcasts.
    #[must_use]
    pub fn worker_agents(&self) -> Vec<WorkerAgentEntry> {
        self.worker_agents.iter().map(|r| r.value().clone()).collect()
    }

    /// Number of connected worker agents.
    #[must_use]
    pub fn worker_agent_count(&self) -> usize {
        self.worker_agents.len()
    }

    /// Adds an expectation manager on connect.
    pub fn add_manager(&self, entry: ExpectationManagerEntry) {
        info!(client_id = %entry.id, "Expectation manager connected");
        self.managers.insert(entry.id.clone(), entry);
    }

    /// Removes an expectation manager on disconnect.
    ///
    /// Returns the removed entry so the caller can announce the loss when
    /// the manager was discoverable.
    pub fn remove_manager(&self, id: &str) -> Option<ExpectationManagerEntry> {
        let removed = self.managers.remove(id).map(|(_, entry)| entry);
        if removed.is_some() {
            info!(client_id = %id, "Expectation manager disconnected");
        }
        removed
    }

    /// Upserts a manager's URL against its existing entry.
    pub fn set_manager_url(&self, manager_id: &str, url: &str) -> UrlRegistration {
        let Some(mut entry) = self.managers.get_mut(manager_id) else {
            return UrlRegistration::Unknown;
        };

        if entry.url.as_deref() == Some(url) {
            return UrlRegistration::Unchanged;
        }
        entry.url = Some(url.to_owned());
        UrlRegistration::Changed
    }

    /// Clears a manager's URL, making it undiscoverable.
    ///
    /// Returns true when the manager was known.
    pub fn clear_manager_url(&self, manager_id: &str) -> bool {
        match self.managers.get_mut(manager_id) {
            Some(mut entry) => {
                entry.url = None;
                true
            }
            None => false,
        }
    }

    /// All managers with a known URL.
    #[must_use]
    pub fn manager_list(&self) -> Vec<ManagerInfo> {
        self.managers
            .iter()
            .filter_map(|entry| {
                entry.url.as_ref().map(|url| ManagerInfo {
                    id: entry.id.clone(),
                    url: url.clone(),
                })
            })
            .collect()
    }

    /// Number of connected expectation managers.
    #[must_use]
    pub fn manager_count(&self) -> usize {
        self.managers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use packwork_adapter::{hook_pair, MethodError, MethodHandler};
    use packwork_proto::{
        AgentWorkforceRequest, AgentWorkforceResponse, WorkforceAgentResponse,
        WorkforceManagerResponse,
    };

    struct NullAgent;

    #[async_trait]
    impl MethodHandler for NullAgent {
        type Request = WorkforceAgentRequest;

        async fn handle(
            &self,
            _request: WorkforceAgentRequest,
        ) -> Result<WorkforceAgentResponse, MethodError> {
            Ok(WorkforceAgentResponse::Done)
        }
    }

    struct NullHub;

    #[async_trait]
    impl MethodHandler for NullHub {
        type Request = AgentWorkforceRequest;

        async fn handle(
            &self,
            _request: AgentWorkforceRequest,
        ) -> Result<AgentWorkforceResponse, MethodError> {
            Ok(AgentWorkforceResponse::ExpectationManagerList(vec![]))
        }
    }

    struct NullManager;

    #[async_trait]
    impl MethodHandler for NullManager {
        type Request = WorkforceManagerRequest;

        async fn handle(
            &self,
            _request: WorkforceManagerRequest,
        ) -> Result<WorkforceManagerResponse, MethodError> {
            Ok(WorkforceManagerResponse::Pong)
        }
    }

    fn agent_entry(id: &str) -> WorkerAgentEntry {
        let (_for_agent, api) = hook_pair(
            id.to_owned(),
            Arc::new(NullAgent) as Arc<dyn MethodHandler<Request = WorkforceAgentRequest>>,
            "workforce",
            Arc::new(NullHub) as Arc<dyn MethodHandler<Request = AgentWorkforceRequest>>,
        );
        WorkerAgentEntry {
            id: id.to_owned(),
            api: Arc::new(api),
        }
    }

    fn manager_entry(id: &str) -> ExpectationManagerEntry {
        let (_for_manager, api) = hook_pair(
            id.to_owned(),
            Arc::new(NullManager) as Arc<dyn MethodHandler<Request = WorkforceManagerRequest>>,
            "workforce",
            Arc::new(NullHub) as Arc<dyn MethodHandler<Request = AgentWorkforceRequest>>,
        );
        ExpectationManagerEntry {
            id: id.to_owned(),
            api: Arc::new(api),
            url: None,
        }
    }

    #[test]
    fn agent_lifecycle() {
        let registry = WorkforceRegistry::new();
        registry.add_worker_agent(agent_entry("agent-1"));
        registry.add_worker_agent(agent_entry("agent-2"));
        assert_eq!(registry.worker_agent_count(), 2);

        registry.remove_worker_agent("agent-1");
        assert_eq!(registry.worker_agent_count(), 1);
        assert!(registry.remove_worker_agent("agent-1").is_none());
    }

    #[test]
    fn manager_url_registration() {
        let registry = WorkforceRegistry::new();
        registry.add_manager(manager_entry("em1"));

        // Not discoverable until registered
        assert!(registry.manager_list().is_empty());

        assert_eq!(
            registry.set_manager_url("em1", "ws://host:1234"),
            UrlRegistration::Changed
        );
        assert_eq!(
            registry.set_manager_url("em1", "ws://host:1234"),
            UrlRegistration::Unchanged
        );
        assert_eq!(
            registry.set_manager_url("em1", "ws://host:5678"),
            UrlRegistration::Changed
        );
        assert_eq!(
            registry.set_manager_url("em2", "ws://other"),
            UrlRegistration::Unknown
        );

        let list = registry.manager_list();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].url, "ws://host:5678");
    }

    #[test]
    fn clearing_url_hides_manager() {
        let registry = WorkforceRegistry::new();
        registry.add_manager(manager_entry("em1"));
        registry.set_manager_url("em1", "ws://host:1234");

        assert!(registry.clear_manager_url("em1"));
        assert!(registry.manager_list().is_empty());
        assert_eq!(registry.manager_count(), 1);

        assert!(!registry.clear_manager_url("em2"));
    }
}
