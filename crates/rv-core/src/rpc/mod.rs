//! Streaming request plumbing: envelopes, transport seam, receivers,
//! cancellable operations and the dispatch context tying them together.

pub mod cancel;
pub mod channel;
pub mod envelope;
pub mod receiver;
pub mod transport;

#[cfg(test)]
pub(crate) mod recording;

pub use cancel::{Operation, OperationState};
pub use channel::{ChannelContext, RemoteObject, RequestHandle};
pub use envelope::{PartialResult, RequestId, RpcReply, RpcRequest, PROTOCOL_VERSION};
pub use receiver::{Delivery, OnCompleteReceiver, Receiver, StreamReceiver};
pub use transport::{close_reason, ReplySink, Transport, TransportEvent, NORMAL_CLOSURE};

use thiserror::Error;

/// Errors raised while issuing a request
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("Failed to encode request: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unknown request {0}")]
    UnknownRequest(RequestId),

    #[error("Channel closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, RpcError>;
