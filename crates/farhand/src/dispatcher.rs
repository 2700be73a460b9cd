//! Controller-side call dispatcher.
//!
//! Issues outbound call frames, assigns call ids, tracks one pending
//! waiter per id, and resolves waiters as matching responses arrive.
//!
//! # Key invariant
//!
//! Only [`Dispatcher::run`] calls `transport.recv()` on the controller
//! side. All response routing happens through the pending map: a call
//! registers a oneshot waiter before sending its frame, and the demux
//! loop delivers the response to that waiter.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use farhand_core::{
    Call, CallId, Frame, Response, ResponsePayload, RpcError, SequenceRef, SequenceStep, Transport,
};

use crate::proxy::SequenceProxy;

/// What a resolved call produces on the controller side.
pub enum Reply<T: Transport> {
    /// A plain value.
    Value(Value),
    /// A pull/terminate step against an established sequence.
    Step(SequenceStep),
    /// A proxy wrapping a freshly established sequence.
    Sequence(SequenceProxy<T>),
}

impl<T: Transport + 'static> Reply<T> {
    /// Resolve a response payload into a reply, turning a
    /// sequence-establishing payload into a [`SequenceProxy`] wrapping the
    /// sequence id and the originating method name.
    pub fn resolve(dispatcher: &Arc<Dispatcher<T>>, method: &str, payload: ResponsePayload) -> Self {
        match payload {
            ResponsePayload::Value(value) => Reply::Value(value),
            ResponsePayload::Step(step) => Reply::Step(step),
            ResponsePayload::Sequence { sequence_id, .. } => Reply::Sequence(SequenceProxy::new(
                dispatcher.clone(),
                method.to_string(),
                sequence_id,
            )),
        }
    }
}

impl<T: Transport + 'static> std::fmt::Debug for Reply<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reply::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Reply::Step(s) => f.debug_tuple("Step").field(s).finish(),
            Reply::Sequence(p) => f.debug_tuple("Sequence").field(&p.sequence_id()).finish(),
        }
    }
}

/// Tracks pending calls and multiplexes responses over one transport.
pub struct Dispatcher<T: Transport> {
    transport: Arc<T>,

    /// Pending waiters: call id -> oneshot sender. An entry lives from
    /// issuance until the matching response arrives or teardown; no two
    /// live entries share an id.
    pending: Mutex<HashMap<CallId, oneshot::Sender<Response>>>,

    /// Next call id. Monotonic, never reused within this instance.
    next_call_id: AtomicU64,
}

impl<T: Transport + 'static> Dispatcher<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Dispatcher {
            transport,
            pending: Mutex::new(HashMap::new()),
            next_call_id: AtomicU64::new(1),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn next_call_id(&self) -> CallId {
        CallId::new(self.next_call_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Number of calls awaiting a response.
    pub fn outstanding(&self) -> usize {
        self.pending.lock().len()
    }

    /// Drop every pending waiter, settling its caller with
    /// `ChannelClosed`. Part of teardown; harmless when already empty.
    pub fn abandon_pending(&self) {
        let abandoned = {
            let mut pending = self.pending.lock();
            let n = pending.len();
            pending.clear();
            n
        };
        if abandoned > 0 {
            debug!(abandoned, "abandoning outstanding calls");
        }
    }

    /// Issue a call and wait for its response payload.
    ///
    /// Error responses reject with the wire message mapped through
    /// [`RpcError::from_wire`]. See [`Reply::resolve`] for turning an
    /// establishment payload into a sequence proxy.
    pub async fn call(
        &self,
        method: &str,
        params: Vec<Value>,
        sequence: Option<SequenceRef>,
    ) -> Result<ResponsePayload, RpcError> {
        let id = self.next_call_id();

        // Register the waiter before sending, so the response can never
        // beat the pending entry.
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        trace!(id = id.get(), method, "issuing call");
        let frame = Frame::Call(Call {
            id,
            method: method.to_string(),
            params,
            sequence,
        });
        if let Err(e) = self.transport.send(frame).await {
            self.pending.lock().remove(&id);
            return Err(RpcError::Transport(e));
        }

        // A dropped sender means the demux loop tore down with this call
        // outstanding.
        let response = rx.await.map_err(|_| RpcError::ChannelClosed)?;
        response.result.map_err(RpcError::from_wire)
    }

    /// Run the demux loop: receive frames and resolve pending waiters.
    ///
    /// Returns `Err(UnmatchedResponse)` on a response whose id has no
    /// pending entry — a protocol violation indicating channel or counter
    /// corruption, deliberately not recovered. On clean channel closure,
    /// drains the pending map so every outstanding call settles with
    /// `ChannelClosed`.
    pub async fn run(self: Arc<Self>) -> Result<(), RpcError> {
        loop {
            let frame = match self.transport.recv().await {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    debug!("channel closed, dispatcher stopping");
                    self.abandon_pending();
                    return Ok(());
                }
                Err(e) => return Err(RpcError::Transport(e)),
            };

            match frame {
                Frame::Response(response) => {
                    let id = response.id;
                    let waiter = self.pending.lock().remove(&id);
                    match waiter {
                        Some(tx) => {
                            // The entry is already discarded; a second
                            // response for this id hits the None arm.
                            let _ = tx.send(response);
                        }
                        None => return Err(RpcError::UnmatchedResponse(id)),
                    }
                }
                other => {
                    debug!(?other, "non-response frame at dispatcher, dropping");
                }
            }
        }
    }
}
