//! Method sets served by the Workforce.
//!
//! Each connecting role sees a different RPC surface, so the Workforce
//! serves three separate method sets.

use serde::{Deserialize, Serialize};

use crate::envelope::MethodSet;
use crate::types::{AppDesc, ManagerId, ManagerInfo};

/// Methods a Worker Agent may call on the Workforce.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "method", content = "args", rename_all = "camelCase")]
pub enum AgentWorkforceRequest {
    /// Returns all expectation managers with a known URL.
    ///
    /// Late-joining agents use this pull query to catch up on managers that
    /// registered before they connected.
    GetExpectationManagerList,
}

/// Responses to [`AgentWorkforceRequest`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum AgentWorkforceResponse {
    /// The current discoverable manager list.
    ExpectationManagerList(Vec<ManagerInfo>),
}

impl MethodSet for AgentWorkforceRequest {
    type Response = AgentWorkforceResponse;
}

/// Methods an Expectation Manager may call on the Workforce.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "method", content = "args", rename_all = "camelCase")]
pub enum ManagerWorkforceRequest {
    /// Registers (or re-registers) the manager's reachable URL.
    ///
    /// Idempotent upsert; a changed URL is pushed to all connected worker
    /// agents as `expectationManagerAvailable`.
    #[serde(rename_all = "camelCase")]
    RegisterExpectationManager {
        /// Manager identifier.
        manager_id: ManagerId,
        /// URL at which worker agents can reach the manager.
        url: String,
    },
    /// Withdraws the manager; pushed to agents as `expectationManagerGone`.
    #[serde(rename_all = "camelCase")]
    RemoveExpectationManager {
        /// Manager identifier.
        manager_id: ManagerId,
    },
}

/// Responses to [`ManagerWorkforceRequest`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum ManagerWorkforceResponse {
    /// The operation completed.
    Done,
}

impl MethodSet for ManagerWorkforceRequest {
    type Response = ManagerWorkforceResponse;
}

/// Methods an App Container may call on the Workforce.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "method", content = "args", rename_all = "camelCase")]
pub enum ContainerWorkforceRequest {
    /// Reports the container's capability list.
    ///
    /// Marks the container as initialised; until then it is not considered
    /// for worker spin-up.
    #[serde(rename_all = "camelCase")]
    RegisterAvailableApps {
        /// App types the container can spin up.
        apps: Vec<AppDesc>,
    },
}

/// Responses to [`ContainerWorkforceRequest`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum ContainerWorkforceResponse {
    /// The operation completed.
    Done,
}

impl MethodSet for ContainerWorkforceRequest {
    type Response = ContainerWorkforceResponse;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_manager_wire_shape() {
        let request = ManagerWorkforceRequest::RegisterExpectationManager {
            manager_id: "em1".to_owned(),
            url: "ws://host:1234".to_owned(),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["method"], "registerExpectationManager");
        assert_eq!(json["args"]["managerId"], "em1");
    }

    #[test]
    fn list_request_has_no_args() {
        let json = serde_json::to_value(AgentWorkforceRequest::GetExpectationManagerList).unwrap();
        assert_eq!(json["method"], "getExpectationManagerList");
        assert!(json.get("args").is_none());
    }

    #[test]
    fn register_apps_roundtrip() {
        let request = ContainerWorkforceRequest::RegisterAvailableApps {
            apps: vec![AppDesc {
                app_type: "worker".to_owned(),
                cost: 1,
            }],
        };
        let json = serde_json::to_string(&request).unwrap();
        let restored: ContainerWorkforceRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(request, restored);
    }
}
