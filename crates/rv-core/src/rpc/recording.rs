//! Transport double that records outbound envelopes and lets tests inject
//! replies and closes by hand.

use ahash::AHashMap;
use parking_lot::Mutex;
use serde::Serialize;

use super::envelope::{PartialResult, RequestId, RpcReply, RpcRequest};
use super::transport::{ReplySink, Transport, NORMAL_CLOSURE};
use super::RpcError;

#[derive(Default)]
pub(crate) struct RecordingTransport {
    fail: bool,
    sink: Mutex<Option<ReplySink>>,
    opened: Mutex<AHashMap<RequestId, ReplySink>>,
    sent: Mutex<Vec<RpcRequest>>,
    closed: Mutex<Vec<RequestId>>,
}

impl RecordingTransport {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) fn requests(&self) -> Vec<RpcRequest> {
        self.sent.lock().clone()
    }

    pub(crate) fn last_request(&self) -> RpcRequest {
        self.sent.lock().last().cloned().expect("no request sent")
    }

    /// Decoded arguments of the most recent request
    pub(crate) fn last_arguments(&self) -> serde_json::Value {
        serde_json::from_str(&self.last_request().arguments).expect("arguments are JSON")
    }

    pub(crate) fn closed(&self) -> Vec<RequestId> {
        self.closed.lock().clone()
    }

    fn sink(&self) -> ReplySink {
        self.sink.lock().clone().expect("no connection opened")
    }

    pub(crate) fn raw(&self, text: &str) {
        self.sink().message(text);
    }

    pub(crate) fn reply<T: Serialize>(&self, request_id: RequestId, done: f64, data: &T) {
        let result = serde_json::to_string(&PartialResult::new(done, data)).unwrap();
        let reply = RpcReply::success(request_id, result);
        self.sink().message(serde_json::to_string(&reply).unwrap());
    }

    pub(crate) fn error(&self, request_id: RequestId, message: &str) {
        let reply = RpcReply::error(request_id, message);
        self.sink().message(serde_json::to_string(&reply).unwrap());
    }

    pub(crate) fn close_with(&self, request_id: RequestId, code: u16) {
        self.sink().closed(request_id, code);
    }

    /// One final partial result followed by a normal close
    pub(crate) fn complete<T: Serialize>(&self, request_id: RequestId, data: &T) {
        self.reply(request_id, 1.0, data);
        self.close_with(request_id, NORMAL_CLOSURE);
    }
}

impl Transport for RecordingTransport {
    fn open(&self, request_id: RequestId, replies: ReplySink) -> Result<(), RpcError> {
        if self.fail {
            return Err(RpcError::Transport("connection refused".into()));
        }
        *self.sink.lock() = Some(replies.clone());
        self.opened.lock().insert(request_id, replies);
        Ok(())
    }

    fn send(&self, _request_id: RequestId, payload: String) -> Result<(), RpcError> {
        let request: RpcRequest = serde_json::from_str(&payload)?;
        self.sent.lock().push(request);
        Ok(())
    }

    fn close(&self, request_id: RequestId) {
        self.opened.lock().remove(&request_id);
        self.closed.lock().push(request_id);
    }
}
