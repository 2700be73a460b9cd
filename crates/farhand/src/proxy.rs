//! Controller-side sequence proxy.
//!
//! Wraps an established sequence id into a local object reproducing
//! pull-based sequence semantics: every `next`/`ret`/`throw` is a further
//! call through the dispatcher, tagged with the sequence id. Single pass
//! only; once `done` is observed, nothing is forwarded again.

use std::convert::Infallible;
use std::sync::Arc;

use async_stream::try_stream;
use futures::Stream;
use serde_json::Value;
use tracing::trace;

use farhand_core::{
    stringify, ResponsePayload, RpcError, SequenceId, SequenceOp, SequenceRef, SequenceStep,
    Transport,
};

use crate::dispatcher::Dispatcher;

/// Local stand-in for a remote lazy sequence.
///
/// The remote handle is never driven by two concurrent operations: each
/// method takes `&mut self`, so the borrow checker enforces the
/// one-operation-at-a-time discipline the relay requires.
pub struct SequenceProxy<T: Transport> {
    dispatcher: Arc<Dispatcher<T>>,
    method: String,
    sequence_id: SequenceId,
    done: bool,
}

impl<T: Transport + 'static> SequenceProxy<T> {
    pub(crate) fn new(dispatcher: Arc<Dispatcher<T>>, method: String, sequence_id: SequenceId) -> Self {
        SequenceProxy {
            dispatcher,
            method,
            sequence_id,
            done: false,
        }
    }

    /// The originating method name.
    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn sequence_id(&self) -> SequenceId {
        self.sequence_id
    }

    /// True once a completion has been observed or acknowledged.
    pub fn is_done(&self) -> bool {
        self.done
    }

    async fn op(&self, op: SequenceOp, argument: Value) -> Result<SequenceStep, RpcError> {
        let sequence = SequenceRef {
            id: self.sequence_id,
            op,
        };
        match self
            .dispatcher
            .call(&self.method, vec![argument], Some(sequence))
            .await?
        {
            ResponsePayload::Step(step) => Ok(step),
            // The router answers sequence-tagged calls with steps only;
            // anything else means the far side is not speaking this
            // protocol.
            other => Err(RpcError::Method(format!(
                "malformed sequence response: {other:?}"
            ))),
        }
    }

    /// Pull the next value, feeding `input` to the suspension point.
    ///
    /// After completion this short-circuits to `{Null, done:true}` without
    /// contacting the channel.
    pub async fn next(&mut self, input: Value) -> Result<SequenceStep, RpcError> {
        if self.done {
            trace!(sequence_id = self.sequence_id.get(), "next after done");
            return Ok(SequenceStep::exhausted());
        }
        let step = self.op(SequenceOp::Pull, input).await?;
        if step.done {
            self.done = true;
        }
        Ok(step)
    }

    /// Terminate the sequence early; it completes with `value`.
    ///
    /// Resolves with the locally supplied value once the remote side has
    /// acknowledged. After completion, resolves locally without a call.
    pub async fn ret(&mut self, value: Value) -> Result<SequenceStep, RpcError> {
        if self.done {
            return Ok(SequenceStep::done(value));
        }
        self.op(SequenceOp::Terminate, value.clone()).await?;
        self.done = true;
        Ok(SequenceStep::done(value))
    }

    /// Inject `error` at the remote suspension point.
    ///
    /// Always settles as a failure: the local error is raised regardless
    /// of the remote acknowledgment, so throwing either stops iteration or
    /// surfaces an error. Once done, nothing is forwarded and the failure
    /// is purely local.
    pub async fn throw(&mut self, error: Value) -> Result<Infallible, RpcError> {
        if !self.done {
            // The remote outcome is an error response by contract; it is
            // deliberately ignored in favor of the local raise.
            let _ = self.op(SequenceOp::InjectError, error.clone()).await;
        }
        self.done = true;
        Err(RpcError::Injected(stringify(&error)))
    }

    /// Consume the proxy as a single-pass stream of yielded values.
    ///
    /// The completing value is not an item, matching `for await`
    /// iteration; failures end the stream with an error item.
    pub fn into_stream(mut self) -> impl Stream<Item = Result<Value, RpcError>> {
        try_stream! {
            loop {
                let step = self.next(Value::Null).await?;
                if step.done {
                    break;
                }
                yield step.value;
            }
        }
    }
}
