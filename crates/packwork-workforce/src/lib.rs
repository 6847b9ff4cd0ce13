//! Packwork Workforce - the fleet hub.
//!
//! The Workforce is responsible for:
//!
//! - **Client tracking**: registries of connected worker agents,
//!   expectation managers, and app containers
//! - **Manager discovery**: relaying expectation-manager availability to
//!   worker agents (push announcements plus a pull query) so agents can
//!   connect to managers directly
//! - **Worker-pool scheduling**: the coalescing WorkerHandler that
//!   reconciles declared demand against planned workers and asks capable
//!   containers to spin capacity up
//! - **Capacity signals**: delta-based CPU utilisation sampling
//!
//! The Workforce is a discovery and scheduling hub, not a relay for the
//! actual work: expectation managers assign work to agents over their own
//! direct connections.

pub mod api;
pub mod config;
pub mod cpu;
pub mod error;
pub mod handler;
pub mod registry;
pub mod server;
pub mod service;

// Re-export main types
pub use config::{ApiConfig, CpuConfig, HandlerConfig, ServerConfig, WorkforceConfig};
pub use cpu::CpuTracker;
pub use error::{Result, WorkforceError};
pub use handler::{AppContainerEntry, PlannedWorker, WorkerHandler};
pub use registry::{
    ExpectationManagerEntry, UrlRegistration, WorkerAgentEntry, WorkforceRegistry,
};
pub use service::{AgentSurface, ContainerSurface, ManagerSurface, Workforce};
