//! Integration tests for manager discovery over live socket connections.

use std::sync::Arc;

use async_trait::async_trait;
use packwork_adapter::{connect, AdapterListener, MethodError, MethodHandler};
use packwork_proto::{
    AgentWorkforceRequest, AgentWorkforceResponse, ClientType, Hello, ManagerWorkforceRequest,
    ManagerWorkforceResponse, WorkforceAgentRequest, WorkforceAgentResponse,
    WorkforceManagerRequest, WorkforceManagerResponse,
};
use packwork_workforce::{server, HandlerConfig, Workforce, WorkerHandler, WorkforceRegistry};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Agent side that records every announcement it receives.
struct RecordingAgent {
    announcements: Arc<Mutex<Vec<WorkforceAgentRequest>>>,
}

#[async_trait]
impl MethodHandler for RecordingAgent {
    type Request = WorkforceAgentRequest;

    async fn handle(
        &self,
        request: WorkforceAgentRequest,
    ) -> Result<WorkforceAgentResponse, MethodError> {
        self.announcements.lock().push(request);
        Ok(WorkforceAgentResponse::Done)
    }
}

/// Manager side; serves only the keepalive surface.
struct QuietManager;

#[async_trait]
impl MethodHandler for QuietManager {
    type Request = WorkforceManagerRequest;

    async fn handle(
        &self,
        request: WorkforceManagerRequest,
    ) -> Result<WorkforceManagerResponse, MethodError> {
        match request {
            WorkforceManagerRequest::Ping => Ok(WorkforceManagerResponse::Pong),
        }
    }
}

async fn start_workforce() -> (Arc<Workforce>, std::net::SocketAddr, CancellationToken) {
    let registry = Arc::new(WorkforceRegistry::new());
    let handler = Arc::new(WorkerHandler::new(HandlerConfig {
        debounce: std::time::Duration::from_millis(10),
        ..HandlerConfig::default()
    }));
    let workforce = Arc::new(Workforce::new(registry, handler));

    let listener = AdapterListener::bind("127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let cancel = CancellationToken::new();
    let (disconnect_tx, disconnect_rx) = mpsc::unbounded_channel();

    tokio::spawn(server::run(
        workforce.clone(),
        listener,
        disconnect_tx,
        cancel.clone(),
    ));
    tokio::spawn(server::run_disconnect_loop(
        workforce.clone(),
        disconnect_rx,
        cancel.clone(),
    ));

    (workforce, addr, cancel)
}

async fn wait_for<F: Fn() -> bool>(condition: F) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("condition not reached within two seconds");
}

#[tokio::test]
async fn manager_registration_reaches_connected_agent() {
    let (workforce, addr, _cancel) = start_workforce().await;

    // Worker agent connects first.
    let announcements = Arc::new(Mutex::new(Vec::new()));
    let _agent = connect::<AgentWorkforceRequest, WorkforceAgentRequest>(
        addr,
        Hello::new("agent-1", ClientType::WorkerAgent),
        Arc::new(RecordingAgent {
            announcements: announcements.clone(),
        }),
    )
    .await
    .unwrap();
    wait_for(|| workforce.registry().worker_agent_count() == 1).await;

    // Expectation manager connects and registers its URL.
    let manager = connect::<ManagerWorkforceRequest, WorkforceManagerRequest>(
        addr,
        Hello::new("em1", ClientType::ExpectationManager),
        Arc::new(QuietManager),
    )
    .await
    .unwrap();
    wait_for(|| workforce.registry().manager_count() == 1).await;

    let response = manager
        .call(ManagerWorkforceRequest::RegisterExpectationManager {
            manager_id: "em1".to_owned(),
            url: "ws://host:1234".to_owned(),
        })
        .await
        .unwrap();
    assert_eq!(response, ManagerWorkforceResponse::Done);

    wait_for(|| !announcements.lock().is_empty()).await;
    {
        let seen = announcements.lock();
        assert_eq!(
            seen[0],
            WorkforceAgentRequest::ExpectationManagerAvailable {
                manager_id: "em1".to_owned(),
                url: "ws://host:1234".to_owned(),
            }
        );
    }

    // Re-registering the same URL announces nothing further.
    manager
        .call(ManagerWorkforceRequest::RegisterExpectationManager {
            manager_id: "em1".to_owned(),
            url: "ws://host:1234".to_owned(),
        })
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(announcements.lock().len(), 1);

    // Removal announces the loss.
    manager
        .call(ManagerWorkforceRequest::RemoveExpectationManager {
            manager_id: "em1".to_owned(),
        })
        .await
        .unwrap();
    wait_for(|| announcements.lock().len() == 2).await;
    {
        let seen = announcements.lock();
        assert_eq!(
            seen[1],
            WorkforceAgentRequest::ExpectationManagerGone {
                manager_id: "em1".to_owned(),
            }
        );
    }
}

#[tokio::test]
async fn late_agent_pulls_current_manager_list() {
    let (workforce, addr, _cancel) = start_workforce().await;

    // Manager registers before any agent connects.
    let manager = connect::<ManagerWorkforceRequest, WorkforceManagerRequest>(
        addr,
        Hello::new("em1", ClientType::ExpectationManager),
        Arc::new(QuietManager),
    )
    .await
    .unwrap();
    wait_for(|| workforce.registry().manager_count() == 1).await;

    manager
        .call(ManagerWorkforceRequest::RegisterExpectationManager {
            manager_id: "em1".to_owned(),
            url: "ws://host:1234".to_owned(),
        })
        .await
        .unwrap();

    // The late agent catches up via the pull query.
    let agent = connect::<AgentWorkforceRequest, WorkforceAgentRequest>(
        addr,
        Hello::new("agent-1", ClientType::WorkerAgent),
        Arc::new(RecordingAgent {
            announcements: Arc::new(Mutex::new(Vec::new())),
        }),
    )
    .await
    .unwrap();

    let AgentWorkforceResponse::ExpectationManagerList(list) = agent
        .call(AgentWorkforceRequest::GetExpectationManagerList)
        .await
        .unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].id, "em1");
    assert_eq!(list[0].url, "ws://host:1234");
}

#[tokio::test]
async fn manager_disconnect_announces_loss() {
    let (workforce, addr, _cancel) = start_workforce().await;

    let announcements = Arc::new(Mutex::new(Vec::new()));
    let _agent = connect::<AgentWorkforceRequest, WorkforceAgentRequest>(
        addr,
        Hello::new("agent-1", ClientType::WorkerAgent),
        Arc::new(RecordingAgent {
            announcements: announcements.clone(),
        }),
    )
    .await
    .unwrap();
    wait_for(|| workforce.registry().worker_agent_count() == 1).await;

    let manager = connect::<ManagerWorkforceRequest, WorkforceManagerRequest>(
        addr,
        Hello::new("em1", ClientType::ExpectationManager),
        Arc::new(QuietManager),
    )
    .await
    .unwrap();
    wait_for(|| workforce.registry().manager_count() == 1).await;

    manager
        .call(ManagerWorkforceRequest::RegisterExpectationManager {
            manager_id: "em1".to_owned(),
            url: "ws://host:1234".to_owned(),
        })
        .await
        .unwrap();
    wait_for(|| announcements.lock().len() == 1).await;

    // Dropping the connection removes the entry and announces the loss.
    manager.release();
    wait_for(|| workforce.registry().manager_count() == 0).await;
    wait_for(|| announcements.lock().len() == 2).await;
    assert!(matches!(
        announcements.lock()[1],
        WorkforceAgentRequest::ExpectationManagerGone { .. }
    ));
}
