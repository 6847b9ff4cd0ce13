//! Method set served by Expectation Managers.

use serde::{Deserialize, Serialize};

use crate::envelope::MethodSet;

/// Methods the Workforce may call on an Expectation Manager.
///
/// The manager's work-assignment protocol is out of scope; the Workforce
/// only keeps the connection alive.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "method", content = "args", rename_all = "camelCase")]
pub enum WorkforceManagerRequest {
    /// Liveness probe.
    Ping,
}

/// Responses to [`WorkforceManagerRequest`].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum WorkforceManagerResponse {
    /// The manager is alive.
    Pong,
}

impl MethodSet for WorkforceManagerRequest {
    type Response = WorkforceManagerResponse;
}
