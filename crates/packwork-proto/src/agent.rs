//! Method set served by Worker Agents.

use serde::{Deserialize, Serialize};

use crate::envelope::MethodSet;
use crate::types::ManagerId;

/// Methods the Workforce may call on a Worker Agent.
///
/// These are the push announcements of the expectation-manager discovery
/// protocol; the Workforce is a discovery hub, not a relay for actual work.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "method", content = "args", rename_all = "camelCase")]
pub enum WorkforceAgentRequest {
    /// A manager became discoverable (or changed its URL).
    #[serde(rename_all = "camelCase")]
    ExpectationManagerAvailable {
        /// Manager identifier.
        manager_id: ManagerId,
        /// URL at which the manager is reachable.
        url: String,
    },
    /// A manager is no longer available.
    #[serde(rename_all = "camelCase")]
    ExpectationManagerGone {
        /// Manager identifier.
        manager_id: ManagerId,
    },
}

/// Responses to [`WorkforceAgentRequest`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum WorkforceAgentResponse {
    /// The announcement was taken in.
    Done,
}

impl MethodSet for WorkforceAgentRequest {
    type Response = WorkforceAgentResponse;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn announcement_wire_shape() {
        let request = WorkforceAgentRequest::ExpectationManagerAvailable {
            manager_id: "em1".to_owned(),
            url: "ws://host:1234".to_owned(),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["method"], "expectationManagerAvailable");
        assert_eq!(json["args"]["url"], "ws://host:1234");
    }
}
