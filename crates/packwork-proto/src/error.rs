//! Error types for the wire protocol.

use thiserror::Error;

/// Protocol-level errors.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The peer's handshake version is not supported.
    #[error("unsupported protocol version {got} (supported {min}..={max})")]
    UnsupportedVersion {
        /// Version the peer announced.
        got: u16,
        /// Minimum supported version.
        min: u16,
        /// Maximum supported version.
        max: u16,
    },

    /// A frame could not be serialised.
    #[error("serialisation error: {0}")]
    Serialisation(String),

    /// A frame could not be deserialised.
    #[error("deserialisation error: {0}")]
    Deserialisation(String),
}
