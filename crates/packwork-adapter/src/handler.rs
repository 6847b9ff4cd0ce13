//! Served method tables.

use async_trait::async_trait;
use packwork_proto::MethodSet;
use thiserror::Error;

/// Error returned by a served method.
///
/// Crosses the wire as a string; the caller sees it as
/// [`AdapterError::Remote`](crate::AdapterError::Remote).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct MethodError(pub String);

impl MethodError {
    /// Creates a method error from any displayable value.
    pub fn new(message: impl std::fmt::Display) -> Self {
        Self(message.to_string())
    }
}

/// The local method table of an endpoint: serves one method set.
///
/// An endpoint's served table is fixed at construction; exposing a different
/// surface requires a new connection.
#[async_trait]
pub trait MethodHandler: Send + Sync {
    /// The method set this handler serves.
    type Request: MethodSet;

    /// Handles a single incoming call.
    async fn handle(
        &self,
        request: Self::Request,
    ) -> std::result::Result<<Self::Request as MethodSet>::Response, MethodError>;
}
