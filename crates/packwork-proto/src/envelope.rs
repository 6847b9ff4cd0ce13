//! Call and response envelopes.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::types::CallId;

/// A request sum type paired with its response sum type.
///
/// Each role pair implements this once; the adapter is generic over it, so a
/// connection can only ever carry the methods its endpoint was constructed
/// with.
pub trait MethodSet:
    Serialize + DeserializeOwned + std::fmt::Debug + Send + Sync + 'static
{
    /// Responses produced by serving this method set.
    type Response: Serialize + DeserializeOwned + std::fmt::Debug + Send + Sync + 'static;
}

/// A method call on the wire: `{"callId", "method", "args"}`.
///
/// The `method`/`args` keys come from the internally tagged request enum
/// flattened into the envelope.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CallEnvelope<R> {
    /// Correlation ID, unique per outstanding call on the connection.
    pub call_id: CallId,
    /// The call itself.
    #[serde(flatten)]
    pub request: R,
}

impl<R> CallEnvelope<R> {
    /// Creates a call envelope with a fresh call ID.
    #[must_use]
    pub fn new(request: R) -> Self {
        Self {
            call_id: CallId::new(),
            request,
        }
    }
}

/// A call outcome on the wire: `{"result": ...}` or `{"error": "..."}`.
///
/// The result payload stays an opaque JSON value at this layer; the caller
/// deserialises it into the response type of the method set it called.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum CallOutcome {
    /// The remote method returned a value.
    #[serde(rename = "result")]
    Result(serde_json::Value),
    /// The remote method failed; carries the stringified remote error.
    #[serde(rename = "error")]
    Error(String),
}

/// A response on the wire: `{"callId", "result"}` or `{"callId", "error"}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    /// Echoes the call ID of the request being answered.
    pub call_id: CallId,
    /// Result or error.
    #[serde(flatten)]
    pub outcome: CallOutcome,
}

impl ResponseEnvelope {
    /// Creates a success response echoing the request's call ID.
    #[must_use]
    pub fn result(call_id: CallId, value: serde_json::Value) -> Self {
        Self {
            call_id,
            outcome: CallOutcome::Result(value),
        }
    }

    /// Creates an error response echoing the request's call ID.
    #[must_use]
    pub fn error(call_id: CallId, message: String) -> Self {
        Self {
            call_id,
            outcome: CallOutcome::Error(message),
        }
    }
}

/// Any frame that can arrive on a connection serving the method set `R`.
///
/// Calls are distinguished from responses structurally: a call carries a
/// `method` key, a response carries `result` or `error`.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Frame<R> {
    /// An incoming method call.
    Call(CallEnvelope<R>),
    /// A response to one of our outstanding calls.
    Response(ResponseEnvelope),
}

impl<'de, R: DeserializeOwned> Deserialize<'de> for Frame<R> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        if value.get("method").is_some() {
            serde_json::from_value(value)
                .map(Frame::Call)
                .map_err(serde::de::Error::custom)
        } else {
            serde_json::from_value(value)
                .map(Frame::Response)
                .map_err(serde::de::Error::custom)
        }
    }
}
