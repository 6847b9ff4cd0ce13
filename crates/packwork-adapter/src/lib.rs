//! Transport-agnostic bidirectional RPC adapter.
//!
//! An [`AdapterEndpoint`] lets one side call the methods the other side
//! serves, whether the two sides share a process or are connected over a
//! socket:
//!
//! - **Hook form**: the call is a direct async invocation of the peer's
//!   registered [`MethodHandler`], with no serialisation boundary. Used
//!   for single-binary deployments; see [`hook_pair`].
//! - **Socket form**: each call is a JSON frame with a correlation ID;
//!   responses are matched back to the pending call. Connection close
//!   rejects all outstanding calls.
//!
//! In both forms a remote call resolves with the remote's return value or an
//! [`AdapterError::Remote`] carrying the stringified remote failure.
//! Per-connection request order is FIFO; concurrent calls may complete out
//! of order relative to each other.

mod endpoint;
mod error;
mod handler;
mod hook;
mod socket;

pub use endpoint::{AdapterEndpoint, Remote};
pub use error::{AdapterError, Result};
pub use handler::{MethodError, MethodHandler};
pub use hook::hook_pair;
pub use socket::{connect, AdapterListener, Disconnect, Incoming, PendingConnection};

/// Maximum size of a single wire frame in bytes (10 MB).
pub const MAX_FRAME_SIZE: usize = 10 * 1024 * 1024;
