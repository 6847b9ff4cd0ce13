//! Error types for the adapter.

use thiserror::Error;
use tokio_util::codec::LinesCodecError;

/// Adapter errors.
#[derive(Error, Debug)]
pub enum AdapterError {
    /// The remote method failed; carries the stringified remote error.
    #[error("remote error: {0}")]
    Remote(String),

    /// The connection closed while the call was outstanding.
    #[error("connection closed")]
    ConnectionClosed,

    /// A frame could not be serialised.
    #[error("serialisation error: {0}")]
    Serialisation(String),

    /// A response payload could not be deserialised.
    #[error("deserialisation error: {0}")]
    Deserialisation(String),

    /// The connection handshake failed.
    #[error("handshake error: {0}")]
    Handshake(String),

    /// Protocol-level failure.
    #[error("protocol error: {0}")]
    Protocol(#[from] packwork_proto::ProtocolError),

    /// Frame framing failure.
    #[error("framing error: {0}")]
    Framing(#[from] LinesCodecError),

    /// I/O error from the underlying transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for adapter operations.
pub type Result<T> = std::result::Result<T, AdapterError>;
