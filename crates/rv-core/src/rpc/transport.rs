//! Transport seam between the streaming channel and the network

use tokio::sync::mpsc;

use super::envelope::RequestId;
use super::RpcError;

/// Close code of a normal shutdown; anything else terminates the request with an error
pub const NORMAL_CLOSURE: u16 = 1000;

/// Something the transport observed on a request's connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A serialized reply envelope
    Message(String),
    /// The connection carrying `request_id` was closed with `code`
    Closed { request_id: RequestId, code: u16 },
}

/// Where a transport pushes what it receives; feeds the channel's dispatch queue
#[derive(Debug, Clone)]
pub struct ReplySink {
    tx: mpsc::UnboundedSender<TransportEvent>,
}

impl ReplySink {
    pub fn new(tx: mpsc::UnboundedSender<TransportEvent>) -> Self {
        Self { tx }
    }

    /// Queue one serialized reply; false if the channel is gone
    pub fn message(&self, text: impl Into<String>) -> bool {
        self.tx.send(TransportEvent::Message(text.into())).is_ok()
    }

    /// Queue the close of a request's connection
    pub fn closed(&self, request_id: RequestId, code: u16) -> bool {
        self.tx
            .send(TransportEvent::Closed { request_id, code })
            .is_ok()
    }
}

/// A connection provider.
///
/// The channel opens one logical connection per request, sends exactly one
/// serialized envelope on it, and closes it after the terminal delivery.
/// Pooled implementations are fine as long as replies carry their request id.
pub trait Transport: Send + Sync {
    /// Open the connection for `request_id`; replies and closes go to `replies`
    fn open(&self, request_id: RequestId, replies: ReplySink) -> Result<(), RpcError>;

    /// Send the serialized request envelope
    fn send(&self, request_id: RequestId, payload: String) -> Result<(), RpcError>;

    /// Tear down the connection; closing an unknown or closed request is a no-op
    fn close(&self, request_id: RequestId);
}

/// Human readable reason for a WebSocket close code
pub fn close_reason(code: u16) -> &'static str {
    match code {
        1000 => "Normal closure.",
        1001 => "Endpoint disconnected.",
        1002 => "Protocol error.",
        1003 => "Incorrect data.",
        1004 => "Reserved.",
        1005 => "No status code.",
        1006 => "Connection closed abnormally.",
        1007 => "Incorrect message type.",
        1008 => "Message violates policy.",
        1009 => "Message too large.",
        1010 => "Protocol extension not supported.",
        1011 => "Unexpected server condition.",
        1015 => "Cannot verify server TLS certificate.",
        _ => "Unknown reason.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_reasons() {
        assert_eq!(close_reason(1006), "Connection closed abnormally.");
        assert_eq!(close_reason(4000), "Unknown reason.");
    }

    #[test]
    fn sink_reports_dropped_channel() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = ReplySink::new(tx);
        assert!(sink.message("{}"));
        drop(rx);
        assert!(!sink.closed(1, NORMAL_CLOSURE));
    }
}
