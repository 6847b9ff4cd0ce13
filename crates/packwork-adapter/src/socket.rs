//! Socket transport: framed JSON links with correlation-ID matching.

use std::net::SocketAddr;
use std::sync::Arc;

use dashmap::DashMap;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use packwork_proto::{
    CallEnvelope, CallId, CallOutcome, ClientId, ClientType, Frame, Hello, MethodSet,
    ProtocolError, ResponseEnvelope,
};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::{Framed, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::endpoint::{AdapterEndpoint, Remote};
use crate::error::{AdapterError, Result};
use crate::handler::MethodHandler;
use crate::MAX_FRAME_SIZE;

type FramedLink = Framed<TcpStream, LinesCodec>;
type PendingCalls = Arc<DashMap<CallId, oneshot::Sender<Result<serde_json::Value>>>>;

/// Notification that a connection is gone, delivered exactly once per
/// connection to the owner's mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disconnect {
    /// Identifier the peer announced in its handshake.
    pub client_id: ClientId,
    /// Role the peer announced in its handshake.
    pub client_type: ClientType,
}

/// The socket-backed callable half of an endpoint.
pub struct SocketCaller {
    outbound: mpsc::UnboundedSender<String>,
    pending: PendingCalls,
    closed: CancellationToken,
}

impl SocketCaller {
    /// Sends a call frame and waits for the matching response frame.
    pub(crate) async fn call<R: MethodSet>(&self, request: R) -> Result<R::Response> {
        if self.closed.is_cancelled() {
            return Err(AdapterError::ConnectionClosed);
        }

        let envelope = CallEnvelope::new(request);
        let call_id = envelope.call_id;
        let line = serde_json::to_string(&envelope)
            .map_err(|e| AdapterError::Serialisation(e.to_string()))?;

        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.insert(call_id, reply_tx);

        if self.outbound.send(line).is_err() {
            self.pending.remove(&call_id);
            return Err(AdapterError::ConnectionClosed);
        }

        let value = reply_rx
            .await
            .map_err(|_| AdapterError::ConnectionClosed)??;
        serde_json::from_value(value).map_err(|e| AdapterError::Deserialisation(e.to_string()))
    }
}

/// Connects to a listening peer and attaches the full endpoint pair.
///
/// Sends the handshake, serves `In` through `handler`, and returns an
/// endpoint for calling the peer's `Out` surface.
pub async fn connect<Out, In>(
    addr: SocketAddr,
    hello: Hello,
    handler: Arc<dyn MethodHandler<Request = In>>,
) -> Result<AdapterEndpoint<Out>>
where
    Out: MethodSet,
    In: MethodSet,
{
    let stream = TcpStream::connect(addr).await?;
    let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_FRAME_SIZE));

    let line =
        serde_json::to_string(&hello).map_err(|e| AdapterError::Serialisation(e.to_string()))?;
    framed.send(line).await?;

    let peer = Disconnect {
        client_id: format!("workforce@{addr}"),
        client_type: ClientType::NotApplicable,
    };
    Ok(spawn_link(framed, peer, handler, None))
}

/// A listener accepting adapter connections.
#[derive(Debug)]
pub struct AdapterListener {
    inner: TcpListener,
}

impl AdapterListener {
    /// Binds to the given address.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let inner = TcpListener::bind(addr).await?;
        Ok(Self { inner })
    }

    /// Returns the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.inner.local_addr()?)
    }

    /// Accepts the next raw connection.
    ///
    /// The caller performs the handshake via [`Incoming::handshake`],
    /// typically in a spawned task so a slow client cannot stall the accept
    /// loop.
    pub async fn accept(&self) -> Result<Incoming> {
        let (stream, peer_addr) = self.inner.accept().await?;
        Ok(Incoming { stream, peer_addr })
    }
}

/// A freshly accepted connection, before its handshake.
#[derive(Debug)]
pub struct Incoming {
    stream: TcpStream,
    peer_addr: SocketAddr,
}

impl Incoming {
    /// Address of the connecting peer.
    #[must_use]
    pub const fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Reads and validates the handshake frame.
    pub async fn handshake(self) -> Result<PendingConnection> {
        let mut framed = Framed::new(self.stream, LinesCodec::new_with_max_length(MAX_FRAME_SIZE));

        let line = framed
            .next()
            .await
            .ok_or_else(|| AdapterError::Handshake("connection closed before handshake".into()))??;
        let hello: Hello = serde_json::from_str(&line)
            .map_err(|e| AdapterError::Handshake(format!("malformed hello: {e}")))?;

        if !packwork_proto::version::is_supported(hello.version) {
            return Err(AdapterError::Protocol(ProtocolError::UnsupportedVersion {
                got: hello.version,
                min: packwork_proto::version::MIN_SUPPORTED,
                max: packwork_proto::version::CURRENT,
            }));
        }

        Ok(PendingConnection {
            framed,
            hello,
            peer_addr: self.peer_addr,
        })
    }
}

/// A handshaken connection whose method tables are not yet attached.
///
/// The accepting side inspects [`PendingConnection::hello`] to pick the
/// role-appropriate method tables, then calls
/// [`attach`](PendingConnection::attach).
pub struct PendingConnection {
    framed: FramedLink,
    hello: Hello,
    peer_addr: SocketAddr,
}

impl PendingConnection {
    /// The peer's handshake.
    #[must_use]
    pub const fn hello(&self) -> &Hello {
        &self.hello
    }

    /// Address of the connecting peer.
    #[must_use]
    pub const fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Attaches the method tables and starts the link.
    ///
    /// Serves `In` through `handler`; returns an endpoint calling the
    /// peer's `Out` surface. When the connection drops, a single
    /// [`Disconnect`] is delivered to `disconnects`.
    pub fn attach<Out, In>(
        self,
        handler: Arc<dyn MethodHandler<Request = In>>,
        disconnects: mpsc::UnboundedSender<Disconnect>,
    ) -> AdapterEndpoint<Out>
    where
        Out: MethodSet,
        In: MethodSet,
    {
        let peer = Disconnect {
            client_id: self.hello.client_id.clone(),
            client_type: self.hello.client_type,
        };
        spawn_link(self.framed, peer, handler, Some(disconnects))
    }
}

/// Starts the reader/writer tasks for a framed link and returns the
/// endpoint for the outgoing direction.
fn spawn_link<Out, In>(
    framed: FramedLink,
    peer: Disconnect,
    handler: Arc<dyn MethodHandler<Request = In>>,
    disconnects: Option<mpsc::UnboundedSender<Disconnect>>,
) -> AdapterEndpoint<Out>
where
    Out: MethodSet,
    In: MethodSet,
{
    let (sink, stream) = framed.split();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<String>();
    let pending: PendingCalls = Arc::new(DashMap::new());
    let closed = CancellationToken::new();

    tokio::spawn(write_loop(sink, outbound_rx, closed.clone()));
    tokio::spawn(read_loop(
        stream,
        outbound_tx.clone(),
        handler,
        pending.clone(),
        closed.clone(),
        peer.clone(),
        disconnects,
    ));

    let caller = SocketCaller {
        outbound: outbound_tx,
        pending,
        closed: closed.clone(),
    };
    AdapterEndpoint::new(peer.client_id, Remote::Socket(caller), closed)
}

/// Owns the sink; writing through one task keeps per-connection request
/// order FIFO.
async fn write_loop(
    mut sink: SplitSink<FramedLink, String>,
    mut outbound: mpsc::UnboundedReceiver<String>,
    closed: CancellationToken,
) {
    loop {
        tokio::select! {
            line = outbound.recv() => {
                let Some(line) = line else { break };
                if let Err(e) = sink.send(line).await {
                    debug!(error = %e, "Write failed, closing link");
                    break;
                }
            }
            () = closed.cancelled() => break,
        }
    }
    closed.cancel();
}

async fn read_loop<In: MethodSet>(
    mut stream: SplitStream<FramedLink>,
    outbound: mpsc::UnboundedSender<String>,
    handler: Arc<dyn MethodHandler<Request = In>>,
    pending: PendingCalls,
    closed: CancellationToken,
    peer: Disconnect,
    disconnects: Option<mpsc::UnboundedSender<Disconnect>>,
) {
    loop {
        let item = tokio::select! {
            item = stream.next() => item,
            () = closed.cancelled() => break,
        };
        let line = match item {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                debug!(client_id = %peer.client_id, error = %e, "Read failed, closing link");
                break;
            }
            None => break,
        };

        match serde_json::from_str::<Frame<In>>(&line) {
            Ok(Frame::Call(envelope)) => {
                // Handlers run in their own task so a slow method cannot
                // block response matching for the calls we have in flight.
                let handler = handler.clone();
                let outbound = outbound.clone();
                tokio::spawn(async move {
                    let response = serve_call(handler.as_ref(), envelope).await;
                    match serde_json::to_string(&response) {
                        Ok(line) => {
                            let _ = outbound.send(line);
                        }
                        Err(e) => warn!(error = %e, "Failed to serialise response"),
                    }
                });
            }
            Ok(Frame::Response(envelope)) => {
                if let Some((_, reply_tx)) = pending.remove(&envelope.call_id) {
                    let result = match envelope.outcome {
                        CallOutcome::Result(value) => Ok(value),
                        CallOutcome::Error(message) => Err(AdapterError::Remote(message)),
                    };
                    let _ = reply_tx.send(result);
                } else {
                    warn!(call_id = %envelope.call_id, "Response without outstanding call");
                }
            }
            Err(e) => warn!(client_id = %peer.client_id, error = %e, "Discarding malformed frame"),
        }
    }

    closed.cancel();

    // Every call still outstanding rejects with a connection-closed error.
    let stranded: Vec<CallId> = pending.iter().map(|entry| *entry.key()).collect();
    for call_id in stranded {
        if let Some((_, reply_tx)) = pending.remove(&call_id) {
            let _ = reply_tx.send(Err(AdapterError::ConnectionClosed));
        }
    }

    if let Some(disconnects) = disconnects {
        let _ = disconnects.send(peer);
    }
}

async fn serve_call<In: MethodSet>(
    handler: &dyn MethodHandler<Request = In>,
    envelope: CallEnvelope<In>,
) -> ResponseEnvelope {
    let call_id = envelope.call_id;
    match handler.handle(envelope.request).await {
        Ok(response) => match serde_json::to_value(response) {
            Ok(value) => ResponseEnvelope::result(call_id, value),
            Err(e) => ResponseEnvelope::error(call_id, format!("response serialisation failed: {e}")),
        },
        Err(e) => ResponseEnvelope::error(call_id, e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::MethodError;
    use async_trait::async_trait;
    use packwork_proto::{
        AgentWorkforceRequest, AgentWorkforceResponse, ManagerInfo, WorkforceAgentRequest,
        WorkforceAgentResponse,
    };

    struct HubSide {
        managers: Vec<ManagerInfo>,
    }

    #[async_trait]
    impl MethodHandler for HubSide {
        type Request = AgentWorkforceRequest;

        async fn handle(
            &self,
            request: AgentWorkforceRequest,
        ) -> std::result::Result<AgentWorkforceResponse, MethodError> {
            match request {
                AgentWorkforceRequest::GetExpectationManagerList => Ok(
                    AgentWorkforceResponse::ExpectationManagerList(self.managers.clone()),
                ),
            }
        }
    }

    struct AgentSide;

    #[async_trait]
    impl MethodHandler for AgentSide {
        type Request = WorkforceAgentRequest;

        async fn handle(
            &self,
            request: WorkforceAgentRequest,
        ) -> std::result::Result<WorkforceAgentResponse, MethodError> {
            match request {
                WorkforceAgentRequest::ExpectationManagerAvailable { manager_id, .. } => {
                    if manager_id == "bad" {
                        Err(MethodError::new("unknown manager"))
                    } else {
                        Ok(WorkforceAgentResponse::Done)
                    }
                }
                WorkforceAgentRequest::ExpectationManagerGone { .. } => {
                    Ok(WorkforceAgentResponse::Done)
                }
            }
        }
    }

    async fn connected_pair() -> (
        AdapterEndpoint<AgentWorkforceRequest>,
        AdapterEndpoint<WorkforceAgentRequest>,
        mpsc::UnboundedReceiver<Disconnect>,
    ) {
        let listener = AdapterListener::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        let (disconnect_tx, disconnect_rx) = mpsc::unbounded_channel();

        let accept = tokio::spawn(async move {
            let incoming = listener.accept().await.unwrap();
            let pending = incoming.handshake().await.unwrap();
            assert_eq!(pending.hello().client_type, ClientType::WorkerAgent);
            pending.attach::<WorkforceAgentRequest, AgentWorkforceRequest>(
                Arc::new(HubSide {
                    managers: vec![ManagerInfo {
                        id: "em1".to_owned(),
                        url: "ws://host:1234".to_owned(),
                    }],
                }),
                disconnect_tx,
            )
        });

        let agent_endpoint = connect::<AgentWorkforceRequest, WorkforceAgentRequest>(
            addr,
            Hello::new("agent-1", ClientType::WorkerAgent),
            Arc::new(AgentSide),
        )
        .await
        .unwrap();

        let hub_endpoint = accept.await.unwrap();
        (agent_endpoint, hub_endpoint, disconnect_rx)
    }

    #[tokio::test]
    async fn socket_calls_in_both_directions() {
        let (agent_endpoint, hub_endpoint, _disconnects) = connected_pair().await;

        let AgentWorkforceResponse::ExpectationManagerList(list) = agent_endpoint
            .call(AgentWorkforceRequest::GetExpectationManagerList)
            .await
            .unwrap();
        assert_eq!(list[0].url, "ws://host:1234");

        let response = hub_endpoint
            .call(WorkforceAgentRequest::ExpectationManagerAvailable {
                manager_id: "em1".to_owned(),
                url: "ws://host:1234".to_owned(),
            })
            .await
            .unwrap();
        assert_eq!(response, WorkforceAgentResponse::Done);
    }

    #[tokio::test]
    async fn socket_remote_error_propagates() {
        let (_agent_endpoint, hub_endpoint, _disconnects) = connected_pair().await;

        let result = hub_endpoint
            .call(WorkforceAgentRequest::ExpectationManagerAvailable {
                manager_id: "bad".to_owned(),
                url: "ws://nowhere".to_owned(),
            })
            .await;

        match result {
            Err(AdapterError::Remote(message)) => assert_eq!(message, "unknown manager"),
            other => panic!("expected remote error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn close_rejects_outstanding_and_notifies_owner() {
        let (agent_endpoint, hub_endpoint, mut disconnects) = connected_pair().await;

        agent_endpoint.release();
        hub_endpoint.closed().await;

        let result = hub_endpoint
            .call(WorkforceAgentRequest::ExpectationManagerGone {
                manager_id: "em1".to_owned(),
            })
            .await;
        assert!(matches!(result, Err(AdapterError::ConnectionClosed)));

        let disconnect = disconnects.recv().await.unwrap();
        assert_eq!(disconnect.client_id, "agent-1");
        assert_eq!(disconnect.client_type, ClientType::WorkerAgent);
    }
}
