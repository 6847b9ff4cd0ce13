//! Method set served by App Containers.

use serde::{Deserialize, Serialize};

use crate::envelope::MethodSet;
use crate::types::{AppId, AppType, AppTypeProposal, RunningApp};

/// Methods the Workforce may call on an App Container.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "method", content = "args", rename_all = "camelCase")]
pub enum WorkforceContainerRequest {
    /// Spins up a new app of the given type; returns its instance id.
    #[serde(rename_all = "camelCase")]
    SpinUp {
        /// App type to start.
        app_type: AppType,
    },
    /// Stops a running app instance.
    #[serde(rename_all = "camelCase")]
    SpinDown {
        /// Instance to stop.
        app_id: AppId,
    },
    /// Lists the container's running app instances.
    GetRunningApps,
    /// Asks which app type (if any) could handle the given expectation.
    ///
    /// The expectation payload is opaque at this layer.
    #[serde(rename_all = "camelCase")]
    RequestAppTypeForExpectation {
        /// The expectation, as produced by an Expectation Manager.
        expectation: serde_json::Value,
    },
}

/// Responses to [`WorkforceContainerRequest`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum WorkforceContainerResponse {
    /// A new app instance was started.
    #[serde(rename_all = "camelCase")]
    SpunUp {
        /// Identifier of the new instance.
        app_id: AppId,
    },
    /// The instance was stopped.
    SpunDown,
    /// The container's running app instances.
    RunningApps(Vec<RunningApp>),
    /// A proposal for the expectation, or `None` if no app type fits.
    AppTypeForExpectation(Option<AppTypeProposal>),
}

impl MethodSet for WorkforceContainerRequest {
    type Response = WorkforceContainerResponse;
}
