//! Common types used across the protocol.

use serde::{Deserialize, Serialize};

/// Unique worker/manager/container client identifier.
pub type ClientId = String;

/// Expectation manager identifier.
pub type ManagerId = String;

/// App type name, e.g. `"worker"`.
pub type AppType = String;

/// Identifier of a spun-up app instance.
pub type AppId = String;

/// Correlation ID for request/response matching.
///
/// Uses ULID format (128-bit, lexicographically sortable, monotonic).
/// Unique per outstanding call on a connection; responses must echo the
/// call ID from the request.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallId(ulid::Ulid);

impl CallId {
    /// Creates a new call ID from the current timestamp.
    #[must_use]
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role of a connecting client.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientType {
    /// A task-executing worker agent.
    #[serde(rename = "workerAgent")]
    WorkerAgent,
    /// An expectation manager assigning units of work.
    #[serde(rename = "expectationManager")]
    ExpectationManager,
    /// A process-hosting node that spins worker agents up and down.
    #[serde(rename = "appContainer")]
    AppContainer,
    /// A client with no declared role.
    #[serde(rename = "N/A")]
    NotApplicable,
}

impl std::fmt::Display for ClientType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::WorkerAgent => "workerAgent",
            Self::ExpectationManager => "expectationManager",
            Self::AppContainer => "appContainer",
            Self::NotApplicable => "N/A",
        };
        write!(f, "{name}")
    }
}

/// Connection handshake, sent as the first frame on a new connection.
///
/// The accepting side must not dispatch RPC frames until the handshake
/// has been received and its version accepted.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Hello {
    /// Protocol version of the connecting party.
    pub version: u16,
    /// Unique identifier of the connecting client.
    pub client_id: ClientId,
    /// Declared role of the connecting client.
    pub client_type: ClientType,
}

impl Hello {
    /// Creates a handshake for the current protocol version.
    #[must_use]
    pub fn new(client_id: impl Into<ClientId>, client_type: ClientType) -> Self {
        Self {
            version: crate::version::CURRENT,
            client_id: client_id.into(),
            client_type,
        }
    }
}

/// An app capability reported by an App Container.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppDesc {
    /// App type the container can spin up.
    pub app_type: AppType,
    /// Relative cost of running this app type on the container.
    pub cost: u32,
}

/// A running app instance reported by an App Container.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RunningApp {
    /// Instance identifier.
    pub app_id: AppId,
    /// App type of the instance.
    pub app_type: AppType,
}

/// A container's answer to "which app type could handle this expectation".
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppTypeProposal {
    /// Proposed app type.
    pub app_type: AppType,
    /// Cost of the proposal.
    pub cost: u32,
}

/// A discoverable expectation manager.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ManagerInfo {
    /// Manager identifier.
    pub id: ManagerId,
    /// URL at which worker agents can reach the manager.
    pub url: String,
}
