//! Generator relay: live sequence instances keyed by relay-assigned id.
//!
//! The relay is exclusively owned and driven by the router's receive loop,
//! so it needs no locking; correctness rests on strictly sequential per-id
//! operations (the controller awaits each sequence operation's response
//! before issuing the next).

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, trace};

use farhand_core::{stringify, LazySequence, SequenceId, SequenceOp, SequenceStep};

/// Holds live sequences and drives them in response to pull / terminate /
/// inject-error requests.
///
/// A handle exists only while its sequence is active: completion through
/// any operation releases it, and operations against a released (or never
/// assigned) id answer the idempotent tail `{Null, done:true}` without
/// touching anything.
#[derive(Default)]
pub struct GeneratorRelay {
    handles: HashMap<SequenceId, Box<dyn LazySequence>>,
    next_id: u64,
}

impl GeneratorRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly created sequence under a new id.
    pub fn adopt(&mut self, sequence: Box<dyn LazySequence>) -> SequenceId {
        self.next_id += 1;
        let id = SequenceId::new(self.next_id);
        self.handles.insert(id, sequence);
        debug!(sequence_id = id.get(), "sequence adopted");
        id
    }

    /// Number of live handles.
    pub fn live(&self) -> usize {
        self.handles.len()
    }

    /// Apply one operation to the handle for `id`.
    ///
    /// `Err` carries the stringified failure that becomes the response's
    /// error field. `InjectError` always produces `Err`: the injection is
    /// never silently swallowed, even when the sequence catches it.
    pub async fn apply(
        &mut self,
        id: SequenceId,
        op: SequenceOp,
        argument: Value,
    ) -> Result<SequenceStep, String> {
        let Some(handle) = self.handles.get_mut(&id) else {
            trace!(sequence_id = id.get(), ?op, "operation on released sequence");
            return Ok(SequenceStep::exhausted());
        };

        match op {
            SequenceOp::Pull => {
                let step = handle.resume(argument).await;
                self.settle(id, &step);
                step
            }
            SequenceOp::Terminate => {
                let step = handle.finish(argument).await;
                // Early termination always completes the sequence.
                self.release(id);
                step
            }
            SequenceOp::InjectError => {
                let error = stringify(&argument);
                let outcome = handle.raise(error).await;
                match outcome {
                    // The sequence caught the injection and produced a
                    // value; the produced value still surfaces as the
                    // error condition. The handle stays live unless the
                    // sequence also completed.
                    Ok(step) => {
                        if step.done {
                            self.release(id);
                        }
                        Err(stringify(&step.value))
                    }
                    Err(failure) => {
                        self.release(id);
                        Err(failure)
                    }
                }
            }
        }
    }

    fn settle(&mut self, id: SequenceId, step: &Result<SequenceStep, String>) {
        match step {
            Ok(step) if step.done => self.release(id),
            Ok(_) => {}
            Err(_) => self.release(id),
        }
    }

    fn release(&mut self, id: SequenceId) {
        if self.handles.remove(&id).is_some() {
            debug!(sequence_id = id.get(), "sequence released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coroutine::Coroutine;
    use serde_json::json;

    fn counting_sequence() -> Box<dyn LazySequence> {
        Box::new(Coroutine::new(|mut y| async move {
            y.yield_value(json!(1)).await?;
            y.yield_value(json!(2)).await?;
            y.yield_value(json!(3)).await?;
            Ok(json!(4))
        }))
    }

    #[tokio::test]
    async fn pull_until_done_releases_handle() {
        let mut relay = GeneratorRelay::new();
        let id = relay.adopt(counting_sequence());
        assert_eq!(relay.live(), 1);

        for expected in [json!(1), json!(2), json!(3)] {
            let step = relay.apply(id, SequenceOp::Pull, Value::Null).await.unwrap();
            assert_eq!(step, SequenceStep::yielded(expected));
        }
        let step = relay.apply(id, SequenceOp::Pull, Value::Null).await.unwrap();
        assert_eq!(step, SequenceStep::done(json!(4)));
        assert_eq!(relay.live(), 0);
    }

    #[tokio::test]
    async fn terminate_completes_early() {
        let mut relay = GeneratorRelay::new();
        let id = relay.adopt(counting_sequence());

        relay.apply(id, SequenceOp::Pull, Value::Null).await.unwrap();
        let step = relay
            .apply(id, SequenceOp::Terminate, json!(7))
            .await
            .unwrap();
        assert_eq!(step, SequenceStep::done(json!(7)));
        assert_eq!(relay.live(), 0);
    }

    #[tokio::test]
    async fn operations_after_release_answer_idempotent_tail() {
        let mut relay = GeneratorRelay::new();
        let id = relay.adopt(counting_sequence());
        relay
            .apply(id, SequenceOp::Terminate, Value::Null)
            .await
            .unwrap();

        for op in [SequenceOp::Pull, SequenceOp::Terminate] {
            let step = relay.apply(id, op, Value::Null).await.unwrap();
            assert_eq!(step, SequenceStep::exhausted());
        }
    }

    #[tokio::test]
    async fn inject_error_surfaces_as_error_and_releases() {
        let mut relay = GeneratorRelay::new();
        let id = relay.adopt(counting_sequence());

        relay.apply(id, SequenceOp::Pull, Value::Null).await.unwrap();
        let err = relay
            .apply(id, SequenceOp::InjectError, json!("boom"))
            .await
            .unwrap_err();
        assert_eq!(err, "boom");
        assert_eq!(relay.live(), 0);
    }

    #[tokio::test]
    async fn caught_injection_keeps_handle_live_but_still_errors() {
        let mut relay = GeneratorRelay::new();
        let id = relay.adopt(Box::new(Coroutine::new(|mut y| async move {
            loop {
                if y.yield_value(json!("tick")).await.is_err() {
                    y.yield_value(json!("survived")).await?;
                }
            }
        })));

        relay.apply(id, SequenceOp::Pull, Value::Null).await.unwrap();
        let err = relay
            .apply(id, SequenceOp::InjectError, json!("boom"))
            .await
            .unwrap_err();
        assert_eq!(err, "survived");
        assert_eq!(relay.live(), 1);

        let step = relay.apply(id, SequenceOp::Pull, Value::Null).await.unwrap();
        assert_eq!(step, SequenceStep::yielded(json!("tick")));
    }

    #[tokio::test]
    async fn sequence_ids_are_monotonic() {
        let mut relay = GeneratorRelay::new();
        let a = relay.adopt(counting_sequence());
        let b = relay.adopt(counting_sequence());
        assert!(b.get() > a.get());
    }
}
