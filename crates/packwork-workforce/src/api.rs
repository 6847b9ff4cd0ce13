//! Read-only HTTP status API.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use packwork_proto::ManagerInfo;
use serde::Serialize;

use crate::cpu::CpuTracker;
use crate::handler::WorkerHandler;
use crate::registry::WorkforceRegistry;

/// Shared state for the status API.
pub struct AppState {
    /// Client registry.
    pub registry: Arc<WorkforceRegistry>,
    /// Worker-pool scheduler.
    pub handler: Arc<WorkerHandler>,
    /// CPU tracker.
    pub cpu: Arc<CpuTracker>,
}

/// Builds the status router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/expectation-managers", get(expectation_managers))
        .with_state(state)
}

#[derive(Serialize)]
struct StatusResponse {
    worker_agents: usize,
    expectation_managers: usize,
    app_containers: usize,
    planned_workers: Vec<PlannedWorkerStatus>,
    cpu_usage: f64,
    idle_cpu_count: usize,
    reconciliation_passes: u64,
}

#[derive(Serialize)]
struct PlannedWorkerStatus {
    app_type: String,
    app_container_id: String,
    app_id: Option<String>,
}

async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let planned_workers = state
        .handler
        .planned_workers()
        .into_iter()
        .map(|p| PlannedWorkerStatus {
            app_type: p.app_type,
            app_container_id: p.app_container_id,
            app_id: p.app_id,
        })
        .collect();

    Json(StatusResponse {
        worker_agents: state.registry.worker_agent_count(),
        expectation_managers: state.registry.manager_count(),
        app_containers: state.handler.containers().len(),
        planned_workers,
        cpu_usage: state.cpu.cpu_usage(),
        idle_cpu_count: state.cpu.idle_cpu_count(),
        reconciliation_passes: state.handler.passes_completed(),
    })
}

async fn expectation_managers(State(state): State<Arc<AppState>>) -> Json<Vec<ManagerInfo>> {
    Json(state.registry.manager_list())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CpuConfig, HandlerConfig};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn test_state() -> Arc<AppState> {
        Arc::new(AppState {
            registry: Arc::new(WorkforceRegistry::new()),
            handler: Arc::new(WorkerHandler::new(HandlerConfig::default())),
            cpu: Arc::new(CpuTracker::new(CpuConfig::default())),
        })
    }

    #[tokio::test]
    async fn status_reports_empty_fleet() {
        let app = router(test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn manager_list_is_empty_initially() {
        let app = router(test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/expectation-managers")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
