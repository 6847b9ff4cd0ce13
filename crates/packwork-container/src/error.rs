//! Error types for the app container.

use thiserror::Error;

/// Container errors.
#[derive(Error, Debug)]
pub enum ContainerError {
    /// RPC failure against the Workforce.
    #[error("adapter error: {0}")]
    Adapter(#[from] packwork_adapter::AdapterError),

    /// The container cannot run the requested app type.
    #[error("unsupported app type: {0}")]
    UnsupportedAppType(String),

    /// No running app with the given id.
    #[error("app not found: {0}")]
    AppNotFound(String),

    /// Process spawning failure.
    #[error("spawn error: {0}")]
    Spawn(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for container operations.
pub type Result<T> = std::result::Result<T, ContainerError>;
