//! Packwork worker agent.
//!
//! Worker-side building blocks of the work distribution fabric:
//!
//! - **File watching**: a deduplicated, debounced stream of
//!   `create`/`update`/`delete` events for the package folder, with
//!   stability detection so partially written packages are never surfaced
//!   as done
//! - **Delayed removal**: crash-safe, TTL-based eviction of package files,
//!   tracked in a JSON ledger that survives restarts
//! - **Manager discovery**: the agent's connection to the Workforce and
//!   its live view of reachable expectation managers
//!
//! How an expectation is fulfilled is out of scope here; these primitives
//! feed the expectation layer with stable file signals and keep disk space
//! reclaimed safely.

pub mod agent;
pub mod config;
pub mod error;
pub mod removal;
pub mod watcher;

// Re-export main types
pub use agent::AgentClient;
pub use config::{HubConfig, RemovalConfig, WatcherConfig, WorkerConfig};
pub use error::{Result, WorkerError};
pub use removal::{DelayedRemovalEntry, RemovalLedger, LEDGER_FILE_NAME};
pub use watcher::{FileEvent, FileEventKind, FileWatcher, WatchEvent};
