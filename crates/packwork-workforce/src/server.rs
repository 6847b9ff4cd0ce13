//! Accept loop for adapter connections.

use std::sync::Arc;

use packwork_adapter::{AdapterListener, Disconnect, Incoming};
use packwork_proto::{
    AgentWorkforceRequest, ClientType, ContainerWorkforceRequest, ManagerWorkforceRequest,
    WorkforceAgentRequest, WorkforceContainerRequest, WorkforceManagerRequest,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::service::{AgentSurface, ContainerSurface, ManagerSurface, Workforce};

/// Runs the accept loop until cancelled.
///
/// Each accepted connection handshakes in its own task so a slow client
/// cannot stall the loop, then gets the method tables matching its declared
/// role.
pub async fn run(
    workforce: Arc<Workforce>,
    listener: AdapterListener,
    disconnects: mpsc::UnboundedSender<Disconnect>,
    cancel: CancellationToken,
) {
    loop {
        let incoming = tokio::select! {
            incoming = listener.accept() => incoming,
            () = cancel.cancelled() => break,
        };

        match incoming {
            Ok(incoming) => {
                let workforce = workforce.clone();
                let disconnects = disconnects.clone();
                tokio::spawn(async move {
                    handle_incoming(workforce, incoming, disconnects).await;
                });
            }
            Err(e) => warn!(error = %e, "Accept failed"),
        }
    }
    info!("Accept loop stopped");
}

/// Runs the disconnect mailbox until cancelled.
///
/// Each connection delivers exactly one [`Disconnect`]; consuming it here
/// keeps registry removal atomic with the connection lifecycle.
pub async fn run_disconnect_loop(
    workforce: Arc<Workforce>,
    mut disconnects: mpsc::UnboundedReceiver<Disconnect>,
    cancel: CancellationToken,
) {
    loop {
        let disconnect = tokio::select! {
            disconnect = disconnects.recv() => disconnect,
            () = cancel.cancelled() => break,
        };
        let Some(disconnect) = disconnect else { break };
        workforce.handle_disconnect(disconnect).await;
    }
}

async fn handle_incoming(
    workforce: Arc<Workforce>,
    incoming: Incoming,
    disconnects: mpsc::UnboundedSender<Disconnect>,
) {
    let peer_addr = incoming.peer_addr();
    let pending = match incoming.handshake().await {
        Ok(pending) => pending,
        Err(e) => {
            warn!(peer_addr = %peer_addr, error = %e, "Handshake failed");
            return;
        }
    };

    let hello = pending.hello().clone();
    info!(
        client_id = %hello.client_id,
        client_type = %hello.client_type,
        peer_addr = %peer_addr,
        "Client connected"
    );

    match hello.client_type {
        ClientType::WorkerAgent => {
            let api = pending.attach::<WorkforceAgentRequest, AgentWorkforceRequest>(
                Arc::new(AgentSurface::new(workforce.clone())),
                disconnects,
            );
            workforce.add_worker_agent(hello.client_id, Arc::new(api));
        }
        ClientType::ExpectationManager => {
            let api = pending.attach::<WorkforceManagerRequest, ManagerWorkforceRequest>(
                Arc::new(ManagerSurface::new(workforce.clone())),
                disconnects,
            );
            workforce.add_expectation_manager(hello.client_id, Arc::new(api));
        }
        ClientType::AppContainer => {
            let api = pending.attach::<WorkforceContainerRequest, ContainerWorkforceRequest>(
                Arc::new(ContainerSurface::new(
                    workforce.clone(),
                    hello.client_id.clone(),
                )),
                disconnects,
            );
            workforce.add_app_container(hello.client_id, Arc::new(api));
        }
        ClientType::NotApplicable => {
            warn!(client_id = %hello.client_id, "Client declared no role, dropping connection");
        }
    }
}
