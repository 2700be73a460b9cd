//! Context-side message router.
//!
//! Single inbound handler for the execution context: dispatches call
//! frames to the method registry / generator relay and emits response
//! frames. Only `Router::run` calls `transport.recv()` on the context
//! side.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, trace, warn};

use farhand_core::{Call, Frame, Response, ResponsePayload, SequenceStep, Transport};

use crate::registry::{Method, MethodRegistry};
use crate::relay::GeneratorRelay;

/// Routes inbound frames for one execution context.
pub struct Router<T: Transport> {
    transport: Arc<T>,
    registry: Arc<MethodRegistry>,
    relay: GeneratorRelay,
}

impl<T: Transport + 'static> Router<T> {
    pub fn new(transport: Arc<T>, registry: MethodRegistry) -> Self {
        Router {
            transport,
            registry: Arc::new(registry),
            relay: GeneratorRelay::new(),
        }
    }

    /// Run the inbound loop until the channel closes or a kill frame
    /// arrives.
    ///
    /// Plain calls are spawned so independent calls resolve out of order;
    /// sequence operations are applied inline, keeping per-id transitions
    /// strictly sequential.
    pub async fn run(mut self) -> std::io::Result<()> {
        loop {
            let frame = match self.transport.recv().await? {
                Some(frame) => frame,
                None => {
                    debug!("channel closed, router stopping");
                    return Ok(());
                }
            };

            match frame {
                Frame::Kill { signal } => {
                    debug!(?signal, "kill requested, router stopping");
                    return Ok(());
                }
                Frame::Response(response) => {
                    // Controller-bound frames have no business here.
                    warn!(id = response.id.get(), "response frame at router, dropping");
                }
                Frame::Call(call) => self.handle_call(call).await?,
            }
        }
    }

    async fn handle_call(&mut self, call: Call) -> std::io::Result<()> {
        let id = call.id;

        if let Some(sequence) = call.sequence {
            let argument = call.params.into_iter().next().unwrap_or(Value::Null);
            trace!(
                id = id.get(),
                sequence_id = sequence.id.get(),
                op = ?sequence.op,
                "sequence operation"
            );
            let result = self
                .relay
                .apply(sequence.id, sequence.op, argument)
                .await
                .map(ResponsePayload::Step);
            return self.transport.send(Frame::Response(Response { id, result })).await;
        }

        match self.registry.lookup(&call.method) {
            None => {
                debug!(id = id.get(), method = %call.method, "unknown method");
                self.transport
                    .send(Frame::Response(Response::err(id, "NO_SUCH_METHOD")))
                    .await
            }
            Some(Method::Plain(f)) => {
                trace!(id = id.get(), method = %call.method, "plain call");
                let future = f(call.params);
                let transport = self.transport.clone();
                // Spawned so a slow method does not block the inbound loop.
                tokio::spawn(async move {
                    let result = future.await.map(ResponsePayload::Value);
                    let _ = transport.send(Frame::Response(Response { id, result })).await;
                });
                Ok(())
            }
            Some(Method::Sequence(factory)) => {
                trace!(id = id.get(), method = %call.method, "sequence call");
                let sequence = factory(call.params);
                let sequence_id = self.relay.adopt(sequence);
                // Establishment response: the body is not driven yet; the
                // first pull arrives as a separate tagged call.
                let payload = ResponsePayload::Sequence {
                    sequence_id,
                    step: SequenceStep {
                        value: Value::Null,
                        done: false,
                    },
                };
                self.transport
                    .send(Frame::Response(Response::ok(id, payload)))
                    .await
            }
        }
    }
}
