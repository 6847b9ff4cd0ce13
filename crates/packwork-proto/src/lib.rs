//! Wire protocol types for Packwork inter-component RPC.
//!
//! Every connection between Packwork components carries newline-delimited
//! JSON frames. A call serialises as `{"callId", "method", "args"}` and its
//! response as `{"callId", "result"}` or `{"callId", "error"}`, matched back
//! to the pending call by `callId`.
//!
//! Each role pair has a fixed method sum type (the request enum) and a
//! matching response enum:
//!
//! - Worker Agent → Workforce: [`AgentWorkforceRequest`]
//! - Expectation Manager → Workforce: [`ManagerWorkforceRequest`]
//! - App Container → Workforce: [`ContainerWorkforceRequest`]
//! - Workforce → Worker Agent: [`WorkforceAgentRequest`]
//! - Workforce → Expectation Manager: [`WorkforceManagerRequest`]
//! - Workforce → App Container: [`WorkforceContainerRequest`]
//!
//! A connection's method tables are fixed at construction; renegotiating the
//! interface requires a new connection.

mod agent;
mod container;
mod envelope;
mod error;
mod manager;
mod types;
mod workforce;

pub use agent::{WorkforceAgentRequest, WorkforceAgentResponse};
pub use container::{WorkforceContainerRequest, WorkforceContainerResponse};
pub use manager::{WorkforceManagerRequest, WorkforceManagerResponse};
pub use envelope::{CallEnvelope, CallOutcome, Frame, MethodSet, ResponseEnvelope};
pub use error::ProtocolError;
pub use types::{
    AppDesc, AppId, AppType, AppTypeProposal, CallId, ClientId, ClientType, Hello, ManagerId,
    ManagerInfo, RunningApp,
};
pub use workforce::{
    AgentWorkforceRequest, AgentWorkforceResponse, ContainerWorkforceRequest,
    ContainerWorkforceResponse, ManagerWorkforceRequest, ManagerWorkforceResponse,
};

/// Protocol version constants.
pub mod version {
    /// Current protocol version.
    pub const CURRENT: u16 = 1;

    /// Minimum supported protocol version.
    pub const MIN_SUPPORTED: u16 = 1;

    /// Checks whether a peer's handshake version is supported.
    #[must_use]
    pub const fn is_supported(version: u16) -> bool {
        version >= MIN_SUPPORTED && version <= CURRENT
    }
}
