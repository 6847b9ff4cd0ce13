//! The RPC surface the container serves to the Workforce.

use std::sync::Arc;

use async_trait::async_trait;
use packwork_adapter::{MethodError, MethodHandler};
use packwork_proto::{
    AppDesc, AppTypeProposal, WorkforceContainerRequest, WorkforceContainerResponse,
};

use crate::runner::AppRunner;

/// Serves spin-up/spin-down and capability queries.
pub struct ContainerService {
    runner: Arc<dyn AppRunner>,
    available_apps: Vec<AppDesc>,
}

impl ContainerService {
    /// Creates the service for a runner and its capability list.
    #[must_use]
    pub fn new(runner: Arc<dyn AppRunner>, available_apps: Vec<AppDesc>) -> Self {
        Self {
            runner,
            available_apps,
        }
    }

    /// The capability list reported to the Workforce.
    #[must_use]
    pub fn available_apps(&self) -> &[AppDesc] {
        &self.available_apps
    }
}

#[async_trait]
impl MethodHandler for ContainerService {
    type Request = WorkforceContainerRequest;

    async fn handle(
        &self,
        request: WorkforceContainerRequest,
    ) -> Result<WorkforceContainerResponse, MethodError> {
        match request {
            WorkforceContainerRequest::SpinUp { app_type } => {
                if !self.available_apps.iter().any(|a| a.app_type == app_type) {
                    return Err(MethodError::new(format!(
                        "unsupported app type: {app_type}"
                    )));
                }
                let app_id = self
                    .runner
                    .spin_up(&app_type)
                    .await
                    .map_err(MethodError::new)?;
                Ok(WorkforceContainerResponse::SpunUp { app_id })
            }
            WorkforceContainerRequest::SpinDown { app_id } => {
                self.runner
                    .spin_down(&app_id)
                    .await
                    .map_err(MethodError::new)?;
                Ok(WorkforceContainerResponse::SpunDown)
            }
            WorkforceContainerRequest::GetRunningApps => Ok(
                WorkforceContainerResponse::RunningApps(self.runner.running_apps()),
            ),
            WorkforceContainerRequest::RequestAppTypeForExpectation { expectation: _ } => {
                // The expectation payload is opaque here; any app type this
                // container can run is offered at its configured cost.
                let proposal = self.available_apps.first().map(|app| AppTypeProposal {
                    app_type: app.app_type.clone(),
                    cost: app.cost,
                });
                Ok(WorkforceContainerResponse::AppTypeForExpectation(proposal))
            }
        }
    }
}
