//! Error types for the worker agent.

use thiserror::Error;

/// Worker errors.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// RPC failure against the Workforce.
    #[error("adapter error: {0}")]
    Adapter(#[from] packwork_adapter::AdapterError),

    /// The Workforce answered with a response variant the call does not
    /// expect.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// File-system watch subscription failure.
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    /// Ledger (de)serialisation failure.
    #[error("serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for worker operations.
pub type Result<T> = std::result::Result<T, WorkerError>;
