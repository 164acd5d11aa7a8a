//! Wire envelopes exchanged with the remote service

use serde::{Deserialize, Serialize};

/// Identifier of one streaming request, unique for the lifetime of a channel
pub type RequestId = u64;

/// Protocol version stamped on every outbound request
pub const PROTOCOL_VERSION: u32 = 6;

/// Outbound request envelope.
///
/// `arguments` holds the JSON encoding of the method arguments; no arguments
/// encode as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcRequest {
    pub object_id: String,
    pub method: String,
    pub arguments: String,
    pub request_id: RequestId,
    pub proto_version: u32,
}

impl RpcRequest {
    pub fn new<A: Serialize + ?Sized>(
        object_id: impl Into<String>,
        method: impl Into<String>,
        arguments: &A,
        request_id: RequestId,
        proto_version: u32,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            object_id: object_id.into(),
            method: method.into(),
            arguments: serde_json::to_string(arguments)?,
            request_id,
            proto_version,
        })
    }

    pub fn serialize(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Inbound reply envelope; `result` is a JSON-encoded partial result or error text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcReply {
    pub result: String,
    pub request_id: RequestId,
    #[serde(default)]
    pub is_error: bool,
}

impl RpcReply {
    pub fn success(request_id: RequestId, result: String) -> Self {
        Self {
            result,
            request_id,
            is_error: false,
        }
    }

    pub fn error(request_id: RequestId, message: impl Into<String>) -> Self {
        Self {
            result: message.into(),
            request_id,
            is_error: true,
        }
    }
}

/// One incremental delivery of a streaming request.
///
/// `done` is informational progress in [0, 1]; it is not monotonic across
/// payload types and never signals completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialResult<T> {
    pub done: f64,
    pub data: T,
}

impl<T> PartialResult<T> {
    pub fn new(done: f64, data: T) -> Self {
        Self { done, data }
    }
}
