//! The adapter endpoint: a typed handle on a remote method table.

use std::sync::Arc;

use packwork_proto::{ClientId, MethodSet};
use tokio_util::sync::CancellationToken;

use crate::error::{AdapterError, Result};
use crate::handler::MethodHandler;
use crate::socket::SocketCaller;

/// The callable half of a connection.
pub enum Remote<R: MethodSet> {
    /// Direct in-process invocation of the peer's method table.
    Hook(Arc<dyn MethodHandler<Request = R>>),
    /// Correlation-ID frames over a socket link.
    Socket(SocketCaller),
}

/// A typed handle for calling the method set `R` served by a peer.
///
/// Destroyed when the underlying socket closes or the process hook is
/// released; after that every call fails with
/// [`AdapterError::ConnectionClosed`].
pub struct AdapterEndpoint<R: MethodSet> {
    peer_id: ClientId,
    remote: Remote<R>,
    closed: CancellationToken,
}

impl<R: MethodSet> AdapterEndpoint<R> {
    pub(crate) fn new(peer_id: ClientId, remote: Remote<R>, closed: CancellationToken) -> Self {
        Self {
            peer_id,
            remote,
            closed,
        }
    }

    /// Calls a remote method and waits for its result.
    ///
    /// Resolves with the remote's return value, or fails with
    /// [`AdapterError::Remote`] when the remote method failed and
    /// [`AdapterError::ConnectionClosed`] when the link dropped mid-call.
    pub async fn call(&self, request: R) -> Result<R::Response> {
        match &self.remote {
            Remote::Hook(handler) => {
                if self.closed.is_cancelled() {
                    return Err(AdapterError::ConnectionClosed);
                }
                handler
                    .handle(request)
                    .await
                    .map_err(|e| AdapterError::Remote(e.to_string()))
            }
            Remote::Socket(caller) => caller.call(request).await,
        }
    }

    /// Identifier of the peer this endpoint calls.
    #[must_use]
    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    /// Returns true once the connection is gone.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Waits until the connection is gone.
    pub async fn closed(&self) {
        self.closed.cancelled().await;
    }

    /// Tears the connection down.
    ///
    /// In hook form this releases both linked endpoints; in socket form it
    /// shuts the link down and rejects outstanding calls.
    pub fn release(&self) {
        self.closed.cancel();
    }
}

impl<R: MethodSet> std::fmt::Debug for AdapterEndpoint<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let form = match self.remote {
            Remote::Hook(_) => "hook",
            Remote::Socket(_) => "socket",
        };
        f.debug_struct("AdapterEndpoint")
            .field("peer_id", &self.peer_id)
            .field("form", &form)
            .field("closed", &self.closed.is_cancelled())
            .finish()
    }
}
