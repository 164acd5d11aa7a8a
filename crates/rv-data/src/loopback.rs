//! In-process transport that routes requests to a [`TableService`].
//!
//! Replies are pushed straight into the channel's reply sink. In held mode
//! requests are parked until released, which lets callers reorder or drop
//! replies the way a slow network would.

use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::Mutex;
use rv_core::rpc::{ReplySink, RequestId, RpcError, RpcRequest, Transport};
use tracing::{debug, trace};

use crate::service::{Outgoing, TableService};

pub struct LoopbackTransport {
    service: Arc<TableService>,
    hold: bool,
    connections: Mutex<AHashMap<RequestId, ReplySink>>,
    held: Mutex<Vec<RpcRequest>>,
}

impl LoopbackTransport {
    /// Answer every request as soon as it is sent
    pub fn new(service: Arc<TableService>) -> Self {
        Self {
            service,
            hold: false,
            connections: Mutex::new(AHashMap::new()),
            held: Mutex::new(Vec::new()),
        }
    }

    /// Park every request until [`release`](Self::release) is called
    pub fn held(service: Arc<TableService>) -> Self {
        Self {
            hold: true,
            ..Self::new(service)
        }
    }

    pub fn service(&self) -> &Arc<TableService> {
        &self.service
    }

    /// Requests waiting to be answered, in arrival order
    pub fn held_requests(&self) -> Vec<RpcRequest> {
        self.held.lock().clone()
    }

    /// Answer one parked request; false if it is not parked
    pub fn release(&self, request_id: RequestId) -> bool {
        let request = {
            let mut held = self.held.lock();
            match held.iter().position(|r| r.request_id == request_id) {
                Some(index) => held.remove(index),
                None => return false,
            }
        };
        self.answer(&request);
        true
    }

    /// Answer every parked request in arrival order
    pub fn release_all(&self) -> usize {
        let requests = std::mem::take(&mut *self.held.lock());
        for request in &requests {
            self.answer(request);
        }
        requests.len()
    }

    /// Push the service's replies into the request's sink; false if nobody is listening
    fn answer(&self, request: &RpcRequest) -> bool {
        let Some(sink) = self.connections.lock().get(&request.request_id).cloned() else {
            debug!(request_id = request.request_id, "connection gone, dropping reply");
            return false;
        };
        for outgoing in self.service.handle(request) {
            let delivered = match outgoing {
                Outgoing::Message(text) => sink.message(text),
                Outgoing::Close(code) => sink.closed(request.request_id, code),
            };
            if !delivered {
                debug!(request_id = request.request_id, "reply sink closed");
                return false;
            }
        }
        true
    }
}

impl Transport for LoopbackTransport {
    fn open(&self, request_id: RequestId, replies: ReplySink) -> Result<(), RpcError> {
        self.connections.lock().insert(request_id, replies);
        Ok(())
    }

    fn send(&self, request_id: RequestId, payload: String) -> Result<(), RpcError> {
        if !self.connections.lock().contains_key(&request_id) {
            return Err(RpcError::UnknownRequest(request_id));
        }
        let request: RpcRequest = serde_json::from_str(&payload)?;
        trace!(request_id, method = %request.method, "loopback request");
        if self.hold {
            self.held.lock().push(request);
        } else if !self.answer(&request) {
            self.close(request_id);
            return Err(RpcError::Closed);
        }
        Ok(())
    }

    fn close(&self, request_id: RequestId) {
        self.connections.lock().remove(&request_id);
        self.held.lock().retain(|r| r.request_id != request_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Table;
    use rv_core::navigation::GET_SCHEMA;
    use rv_core::rpc::{RpcReply, TransportEvent, NORMAL_CLOSURE, PROTOCOL_VERSION};
    use rv_core::schema::{ColumnDescription, ContentsKind, Schema};
    use serde_json::json;
    use tokio::sync::mpsc;

    fn service() -> Arc<TableService> {
        let service = TableService::new();
        let schema = Schema::new(vec![ColumnDescription::new("x", ContentsKind::Integer, false)]);
        service.register_as("t", Table::new(schema, vec![vec![json!(1)]]).unwrap());
        Arc::new(service)
    }

    fn payload(request_id: RequestId) -> String {
        RpcRequest::new("t", GET_SCHEMA, &None::<()>, request_id, PROTOCOL_VERSION)
            .unwrap()
            .serialize()
            .unwrap()
    }

    #[test]
    fn answers_immediately() {
        let transport = LoopbackTransport::new(service());
        let (tx, mut rx) = mpsc::unbounded_channel();
        transport.open(1, ReplySink::new(tx)).unwrap();
        transport.send(1, payload(1)).unwrap();

        let Ok(TransportEvent::Message(text)) = rx.try_recv() else {
            panic!("expected a reply");
        };
        let reply: RpcReply = serde_json::from_str(&text).unwrap();
        assert_eq!(reply.request_id, 1);
        assert!(!reply.is_error);
        assert_eq!(
            rx.try_recv().ok(),
            Some(TransportEvent::Closed { request_id: 1, code: NORMAL_CLOSURE })
        );
    }

    #[test]
    fn holds_until_released() {
        let transport = LoopbackTransport::held(service());
        let (tx, mut rx) = mpsc::unbounded_channel();
        for id in [1, 2] {
            transport.open(id, ReplySink::new(tx.clone())).unwrap();
            transport.send(id, payload(id)).unwrap();
        }
        assert!(rx.try_recv().is_err());
        assert_eq!(transport.held_requests().len(), 2);

        assert!(transport.release(2));
        assert!(!transport.release(2));
        let Ok(TransportEvent::Message(text)) = rx.try_recv() else {
            panic!("expected a reply");
        };
        assert_eq!(serde_json::from_str::<RpcReply>(&text).unwrap().request_id, 2);

        transport.close(1);
        assert_eq!(transport.release_all(), 0);
    }

    #[test]
    fn send_without_open_fails() {
        let transport = LoopbackTransport::new(service());
        assert!(matches!(transport.send(9, payload(9)), Err(RpcError::UnknownRequest(9))));
    }

    #[test]
    fn send_after_dispatcher_is_gone_fails() {
        let transport = LoopbackTransport::new(service());
        let (tx, rx) = mpsc::unbounded_channel();
        transport.open(4, ReplySink::new(tx)).unwrap();
        drop(rx);

        assert!(matches!(transport.send(4, payload(4)), Err(RpcError::Closed)));
        assert!(matches!(transport.send(4, payload(4)), Err(RpcError::UnknownRequest(4))));
    }
}
