//! Error types for the Workforce.

use thiserror::Error;

/// Workforce errors.
#[derive(Error, Debug)]
pub enum WorkforceError {
    /// RPC failure against a connected client.
    #[error("adapter error: {0}")]
    Adapter(#[from] packwork_adapter::AdapterError),

    /// A remote answered with a response variant the call does not expect.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// App Container not found.
    #[error("app container not found: {0}")]
    ContainerNotFound(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for Workforce operations.
pub type Result<T> = std::result::Result<T, WorkforceError>;
