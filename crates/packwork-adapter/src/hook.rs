//! In-process hook transport.

use std::sync::Arc;

use packwork_proto::{ClientId, MethodSet};
use tokio_util::sync::CancellationToken;

use crate::endpoint::{AdapterEndpoint, Remote};
use crate::handler::MethodHandler;

/// Creates a linked pair of in-process endpoints.
///
/// Side one serves `S1` and gets back an endpoint calling `S2`; side two
/// serves `S2` and gets back an endpoint calling `S1`. Calls are direct
/// async invocations against the peer's handler, with no serialisation
/// boundary. Used when both components run in one process (single-binary
/// deployments).
///
/// The two endpoints share a lifecycle: releasing either one destroys both.
pub fn hook_pair<S1, S2>(
    side_one_id: impl Into<ClientId>,
    side_one_handler: Arc<dyn MethodHandler<Request = S1>>,
    side_two_id: impl Into<ClientId>,
    side_two_handler: Arc<dyn MethodHandler<Request = S2>>,
) -> (AdapterEndpoint<S2>, AdapterEndpoint<S1>)
where
    S1: MethodSet,
    S2: MethodSet,
{
    let closed = CancellationToken::new();

    let for_side_one = AdapterEndpoint::new(
        side_two_id.into(),
        Remote::Hook(side_two_handler),
        closed.clone(),
    );
    let for_side_two =
        AdapterEndpoint::new(side_one_id.into(), Remote::Hook(side_one_handler), closed);

    (for_side_one, for_side_two)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::MethodError;
    use crate::AdapterError;
    use async_trait::async_trait;
    use packwork_proto::{
        AgentWorkforceRequest, AgentWorkforceResponse, ManagerInfo, WorkforceAgentRequest,
        WorkforceAgentResponse,
    };

    struct ListServer {
        managers: Vec<ManagerInfo>,
    }

    #[async_trait]
    impl MethodHandler for ListServer {
        type Request = AgentWorkforceRequest;

        async fn handle(
            &self,
            request: AgentWorkforceRequest,
        ) -> Result<AgentWorkforceResponse, MethodError> {
            match request {
                AgentWorkforceRequest::GetExpectationManagerList => Ok(
                    AgentWorkforceResponse::ExpectationManagerList(self.managers.clone()),
                ),
            }
        }
    }

    struct RejectingAgent;

    #[async_trait]
    impl MethodHandler for RejectingAgent {
        type Request = WorkforceAgentRequest;

        async fn handle(
            &self,
            _request: WorkforceAgentRequest,
        ) -> Result<WorkforceAgentResponse, MethodError> {
            Err(MethodError::new("agent not ready"))
        }
    }

    #[tokio::test]
    async fn hook_call_roundtrip() {
        let managers = vec![ManagerInfo {
            id: "em1".to_owned(),
            url: "ws://host:1234".to_owned(),
        }];
        let (_for_hub, for_agent) = hook_pair(
            "workforce",
            Arc::new(ListServer { managers }) as Arc<dyn MethodHandler<Request = AgentWorkforceRequest>>,
            "agent-1",
            Arc::new(RejectingAgent) as Arc<dyn MethodHandler<Request = WorkforceAgentRequest>>,
        );

        let response = for_agent
            .call(AgentWorkforceRequest::GetExpectationManagerList)
            .await
            .unwrap();
        let AgentWorkforceResponse::ExpectationManagerList(list) = response;
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, "em1");
    }

    #[tokio::test]
    async fn hook_remote_error_propagates() {
        let (for_hub, _for_agent) = hook_pair(
            "workforce",
            Arc::new(ListServer { managers: vec![] }) as Arc<dyn MethodHandler<Request = AgentWorkforceRequest>>,
            "agent-1",
            Arc::new(RejectingAgent) as Arc<dyn MethodHandler<Request = WorkforceAgentRequest>>,
        );

        let result = for_hub
            .call(WorkforceAgentRequest::ExpectationManagerGone {
                manager_id: "em1".to_owned(),
            })
            .await;

        match result {
            Err(AdapterError::Remote(message)) => assert_eq!(message, "agent not ready"),
            other => panic!("expected remote error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn released_hook_rejects_calls() {
        let (for_hub, for_agent) = hook_pair(
            "workforce",
            Arc::new(ListServer { managers: vec![] }) as Arc<dyn MethodHandler<Request = AgentWorkforceRequest>>,
            "agent-1",
            Arc::new(RejectingAgent) as Arc<dyn MethodHandler<Request = WorkforceAgentRequest>>,
        );

        for_hub.release();
        assert!(for_agent.is_closed());

        let result = for_agent
            .call(AgentWorkforceRequest::GetExpectationManagerList)
            .await;
        assert!(matches!(result, Err(AdapterError::ConnectionClosed)));
    }
}
