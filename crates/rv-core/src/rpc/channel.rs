//! Streaming channel.
//!
//! `ChannelContext` owns the request counter and the table of in-flight
//! requests. Every transport event lands in one inbound queue and is handed
//! to [`ChannelContext::dispatch`], either synchronously through
//! [`ChannelContext::pump`] or from the async [`ChannelContext::run`] loop.
//!
//! Receivers never run under the table lock, so a receiver may issue
//! follow-up requests on the same channel.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::cancel::Operation;
use super::envelope::{PartialResult, RequestId, RpcReply, RpcRequest, PROTOCOL_VERSION};
use super::receiver::{Delivery, RawReceiver, Receiver, TypedReceiver};
use super::transport::{close_reason, ReplySink, Transport, TransportEvent, NORMAL_CLOSURE};
use super::Result;

struct PendingRequest {
    method: String,
    operation: Operation,
    /// `None` until attached, and while a delivery batch is running
    receiver: Option<Box<dyn RawReceiver>>,
    queued: VecDeque<Delivery<Value>>,
    terminated: bool,
}

pub struct ChannelContext {
    transport: Arc<dyn Transport>,
    proto_version: u32,
    next_request_id: AtomicU64,
    pending: Mutex<AHashMap<RequestId, PendingRequest>>,
    inbound_tx: mpsc::UnboundedSender<TransportEvent>,
    inbound_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<TransportEvent>>,
}

impl ChannelContext {
    pub fn new(transport: Arc<dyn Transport>) -> Arc<Self> {
        Self::with_protocol_version(transport, PROTOCOL_VERSION)
    }

    pub fn with_protocol_version(transport: Arc<dyn Transport>, proto_version: u32) -> Arc<Self> {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            transport,
            proto_version,
            next_request_id: AtomicU64::new(0),
            pending: Mutex::new(AHashMap::new()),
            inbound_tx,
            inbound_rx: tokio::sync::Mutex::new(inbound_rx),
        })
    }

    /// Sink handed to the transport when a request's connection opens
    pub fn reply_sink(&self) -> ReplySink {
        ReplySink::new(self.inbound_tx.clone())
    }

    /// Number of requests that have not delivered their terminal signal
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Serialize and send one request.
    ///
    /// Replies arriving before a receiver is attached are queued on the request.
    pub fn send<A: Serialize + ?Sized>(
        self: &Arc<Self>,
        object_id: &str,
        method: &str,
        arguments: &A,
        operation: Operation,
    ) -> Result<RequestHandle> {
        self.sweep_cancelled();

        let request_id = self.next_request_id.fetch_add(1, Ordering::SeqCst);
        let payload = RpcRequest::new(object_id, method, arguments, request_id, self.proto_version)?
            .serialize()?;

        self.pending.lock().insert(
            request_id,
            PendingRequest {
                method: method.to_string(),
                operation: operation.clone(),
                receiver: None,
                queued: VecDeque::new(),
                terminated: false,
            },
        );

        let sent = self
            .transport
            .open(request_id, self.reply_sink())
            .and_then(|_| self.transport.send(request_id, payload));
        if let Err(err) = sent {
            self.pending.lock().remove(&request_id);
            operation.fail();
            return Err(err);
        }

        debug!(request_id, object_id, method, "request sent");
        Ok(RequestHandle {
            channel: self.clone(),
            request_id,
            operation,
        })
    }

    /// Dispatch every queued transport event; returns how many were handled.
    ///
    /// Returns immediately while [`run`](Self::run) owns the queue.
    pub fn pump(&self) -> usize {
        let mut dispatched = 0;
        loop {
            let event = {
                let Ok(mut inbound) = self.inbound_rx.try_lock() else {
                    return dispatched;
                };
                match inbound.try_recv() {
                    Ok(event) => event,
                    Err(_) => return dispatched,
                }
            };
            self.dispatch(event);
            dispatched += 1;
        }
    }

    /// Dispatch loop for async hosts; runs until the task is dropped
    pub async fn run(&self) {
        loop {
            let event = {
                let mut inbound = self.inbound_rx.lock().await;
                inbound.recv().await
            };
            match event {
                Some(event) => self.dispatch(event),
                None => break,
            }
        }
    }

    /// Route one transport event to its request
    pub fn dispatch(&self, event: TransportEvent) {
        match event {
            TransportEvent::Message(text) => {
                let reply: RpcReply = match serde_json::from_str(&text) {
                    Ok(reply) => reply,
                    Err(err) => {
                        warn!(error = %err, "dropping malformed reply envelope");
                        return;
                    }
                };
                let request_id = reply.request_id;
                if !self.pending.lock().contains_key(&request_id) {
                    warn!(request_id, "dropping reply for unknown request");
                    return;
                }
                let delivery = if reply.is_error {
                    Delivery::Error(reply.result)
                } else {
                    match serde_json::from_str::<PartialResult<Value>>(&reply.result) {
                        Ok(partial) => Delivery::Next(partial),
                        Err(err) => {
                            warn!(request_id, error = %err, "dropping unparsable partial result");
                            return;
                        }
                    }
                };
                self.enqueue(request_id, delivery);
            }
            TransportEvent::Closed { request_id, code } => {
                let delivery = if code == NORMAL_CLOSURE {
                    Delivery::Completed
                } else {
                    Delivery::Error(close_reason(code).to_string())
                };
                self.enqueue(request_id, delivery);
            }
        }
    }

    fn enqueue(&self, request_id: RequestId, delivery: Delivery<Value>) {
        let receiver = {
            let mut pending = self.pending.lock();
            let Some(entry) = pending.get_mut(&request_id) else {
                debug!(request_id, "ignoring delivery for finished request");
                return;
            };
            if entry.operation.is_cancelled() {
                pending.remove(&request_id);
                drop(pending);
                debug!(request_id, "request cancelled, dropping delivery");
                self.transport.close(request_id);
                return;
            }
            if entry.terminated {
                debug!(request_id, "ignoring delivery after terminal signal");
                return;
            }
            debug!(request_id, method = %entry.method, terminal = delivery.is_terminal(), "reply dispatched");
            entry.terminated = delivery.is_terminal();
            entry.queued.push_back(delivery);
            entry.receiver.take()
        };
        if let Some(receiver) = receiver {
            self.drain(request_id, receiver);
        }
    }

    /// Deliver queued items to `receiver` until the queue is empty, then park it back
    fn drain(&self, request_id: RequestId, mut receiver: Box<dyn RawReceiver>) {
        loop {
            let (batch, operation) = {
                let mut pending = self.pending.lock();
                let Some(entry) = pending.get_mut(&request_id) else {
                    return;
                };
                if entry.queued.is_empty() {
                    entry.receiver = Some(receiver);
                    return;
                }
                let batch: Vec<_> = entry.queued.drain(..).collect();
                (batch, entry.operation.clone())
            };

            for delivery in batch {
                if operation.is_cancelled() {
                    self.pending.lock().remove(&request_id);
                    debug!(request_id, "request cancelled, dropping queued deliveries");
                    self.transport.close(request_id);
                    return;
                }
                let failed = matches!(delivery, Delivery::Error(_));
                let terminal = delivery.is_terminal();
                receiver.deliver(request_id, delivery);
                if terminal {
                    self.finish(request_id, &operation, failed);
                    return;
                }
            }
        }
    }

    fn finish(&self, request_id: RequestId, operation: &Operation, failed: bool) {
        self.pending.lock().remove(&request_id);
        if failed {
            operation.fail();
        } else {
            operation.complete();
        }
        self.transport.close(request_id);
    }

    /// Drop entries whose operations were cancelled and will never be read
    fn sweep_cancelled(&self) {
        let cancelled: Vec<RequestId> = {
            let mut pending = self.pending.lock();
            let ids: Vec<RequestId> = pending
                .iter()
                .filter(|(_, entry)| entry.operation.is_cancelled())
                .map(|(id, _)| *id)
                .collect();
            for id in &ids {
                pending.remove(id);
            }
            ids
        };
        for request_id in cancelled {
            debug!(request_id, "swept cancelled request");
            self.transport.close(request_id);
        }
    }
}

/// A sent request waiting for its receiver
pub struct RequestHandle {
    channel: Arc<ChannelContext>,
    request_id: RequestId,
    operation: Operation,
}

impl RequestHandle {
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    /// Attach the receiver; anything already queued is delivered now
    pub fn attach<T, R>(self, receiver: R)
    where
        T: DeserializeOwned + 'static,
        R: Receiver<T> + 'static,
    {
        let raw: Box<dyn RawReceiver> = Box::new(TypedReceiver::<T, R>::new(receiver));
        self.channel.drain(self.request_id, raw);
    }
}

/// A remote object addressed by id over a shared channel
#[derive(Clone)]
pub struct RemoteObject {
    object_id: String,
    channel: Arc<ChannelContext>,
}

impl RemoteObject {
    pub fn new(object_id: impl Into<String>, channel: Arc<ChannelContext>) -> Self {
        Self {
            object_id: object_id.into(),
            channel,
        }
    }

    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    pub fn channel(&self) -> &Arc<ChannelContext> {
        &self.channel
    }

    pub fn create_request<A: Serialize + ?Sized>(
        &self,
        method: &str,
        arguments: &A,
        operation: Operation,
    ) -> Result<RequestHandle> {
        self.channel.send(&self.object_id, method, arguments, operation)
    }
}

impl std::fmt::Debug for RemoteObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteObject")
            .field("object_id", &self.object_id)
            .finish()
    }
}
