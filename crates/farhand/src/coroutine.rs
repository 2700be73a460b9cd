//! Task-backed lazy sequences.
//!
//! A [`Coroutine`] runs a sequence body as a spawned task and reproduces
//! pull-based generator semantics over a pair of rendezvous channels: the
//! driver sends resume signals in, the body sends yielded values out. The
//! body does not start running until the first pull arrives, matching
//! generator laziness, and each `yield_value` suspends the body until the
//! consumer pulls again.

use std::future::Future;

use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use farhand_core::{LazySequence, SequenceResult, SequenceStep};

/// An error injected at the body's suspension point.
///
/// `yield_value` returns this when the consumer calls `throw`. The body
/// may catch it and keep yielding, or propagate it with `?` to fail the
/// sequence with the injected message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Injected(pub String);

impl std::fmt::Display for Injected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for Injected {}

impl From<Injected> for String {
    fn from(e: Injected) -> String {
        e.0
    }
}

enum ResumeSignal {
    Next(Value),
    Raise(String),
}

enum Emitted {
    Yielded(Value),
    Complete(Value),
    Failed(String),
}

/// Handed to a sequence body; the body's side of the suspension protocol.
pub struct Yielder {
    events: mpsc::Sender<Emitted>,
    signals: mpsc::Receiver<ResumeSignal>,
}

impl Yielder {
    /// Yield `value` to the consumer and suspend until the next pull.
    ///
    /// Resolves to the next resume input, or `Err(Injected)` when the
    /// consumer injected an error at this suspension point. Also fails
    /// with `Injected` if the sequence was torn down while suspended.
    pub async fn yield_value(&mut self, value: Value) -> Result<Value, Injected> {
        if self.events.send(Emitted::Yielded(value)).await.is_err() {
            return Err(Injected("sequence dropped".into()));
        }
        match self.signals.recv().await {
            Some(ResumeSignal::Next(input)) => Ok(input),
            Some(ResumeSignal::Raise(error)) => Err(Injected(error)),
            None => Err(Injected("sequence dropped".into())),
        }
    }
}

/// A [`LazySequence`] backed by a spawned task.
pub struct Coroutine {
    signals: mpsc::Sender<ResumeSignal>,
    events: mpsc::Receiver<Emitted>,
    task: JoinHandle<()>,
}

impl Coroutine {
    /// Create the sequence instance. The body is spawned immediately but
    /// parked on the first resume signal, so no user code runs until the
    /// consumer pulls.
    ///
    /// Must be called within a tokio runtime.
    pub fn new<F, Fut>(body: F) -> Self
    where
        F: FnOnce(Yielder) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Value, String>> + Send + 'static,
    {
        let (signal_tx, mut signal_rx) = mpsc::channel(1);
        let (event_tx, event_rx) = mpsc::channel(1);

        let task = tokio::spawn(async move {
            match signal_rx.recv().await {
                // The first resume input has no suspension point to land
                // on; it is discarded, as with generators.
                Some(ResumeSignal::Next(_)) => {}
                Some(ResumeSignal::Raise(error)) => {
                    let _ = event_tx.send(Emitted::Failed(error)).await;
                    return;
                }
                None => return,
            }

            let yielder = Yielder {
                events: event_tx.clone(),
                signals: signal_rx,
            };
            let emitted = match body(yielder).await {
                Ok(value) => Emitted::Complete(value),
                Err(error) => Emitted::Failed(error),
            };
            let _ = event_tx.send(emitted).await;
        });

        Coroutine {
            signals: signal_tx,
            events: event_rx,
            task,
        }
    }

    async fn exchange(&mut self, signal: ResumeSignal) -> Option<Emitted> {
        if self.signals.send(signal).await.is_err() {
            return None;
        }
        self.events.recv().await
    }
}

impl Drop for Coroutine {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl LazySequence for Coroutine {
    fn resume(&mut self, input: Value) -> BoxFuture<'_, SequenceResult> {
        Box::pin(async move {
            match self.exchange(ResumeSignal::Next(input)).await {
                Some(Emitted::Yielded(value)) => Ok(SequenceStep::yielded(value)),
                Some(Emitted::Complete(value)) => Ok(SequenceStep::done(value)),
                Some(Emitted::Failed(error)) => Err(error),
                // Body already gone; nothing left to produce.
                None => Ok(SequenceStep::exhausted()),
            }
        })
    }

    fn finish(&mut self, value: Value) -> BoxFuture<'_, SequenceResult> {
        // Early termination stops the body at its suspension point and
        // completes with the supplied value. No finally-style cleanup runs
        // in the body.
        self.task.abort();
        Box::pin(async move { Ok(SequenceStep::done(value)) })
    }

    fn raise(&mut self, error: String) -> BoxFuture<'_, SequenceResult> {
        Box::pin(async move {
            match self.exchange(ResumeSignal::Raise(error.clone())).await {
                Some(Emitted::Yielded(value)) => Ok(SequenceStep::yielded(value)),
                Some(Emitted::Complete(value)) => Ok(SequenceStep::done(value)),
                Some(Emitted::Failed(failure)) => Err(failure),
                // Body already gone; the injection itself is the failure.
                None => Err(error),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn yields_then_completes() {
        let mut seq = Coroutine::new(|mut y| async move {
            y.yield_value(json!(1)).await?;
            y.yield_value(json!(2)).await?;
            Ok(json!(3))
        });

        assert_eq!(
            seq.resume(Value::Null).await.unwrap(),
            SequenceStep::yielded(json!(1))
        );
        assert_eq!(
            seq.resume(Value::Null).await.unwrap(),
            SequenceStep::yielded(json!(2))
        );
        assert_eq!(
            seq.resume(Value::Null).await.unwrap(),
            SequenceStep::done(json!(3))
        );
    }

    #[tokio::test]
    async fn resume_input_reaches_suspension_point() {
        let mut seq = Coroutine::new(|mut y| async move {
            let x = y.yield_value(json!(1)).await?;
            y.yield_value(json!(2 + x.as_i64().unwrap())).await?;
            Ok(Value::Null)
        });

        assert_eq!(
            seq.resume(Value::Null).await.unwrap(),
            SequenceStep::yielded(json!(1))
        );
        assert_eq!(
            seq.resume(json!(2)).await.unwrap(),
            SequenceStep::yielded(json!(4))
        );
    }

    #[tokio::test]
    async fn body_does_not_run_before_first_resume() {
        let started = Arc::new(AtomicBool::new(false));
        let flag = started.clone();
        let mut seq = Coroutine::new(move |mut y| async move {
            flag.store(true, Ordering::SeqCst);
            y.yield_value(json!(1)).await?;
            Ok(Value::Null)
        });

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(!started.load(Ordering::SeqCst));

        seq.resume(Value::Null).await.unwrap();
        assert!(started.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn injected_error_can_be_caught() {
        let mut seq = Coroutine::new(|mut y| async move {
            match y.yield_value(json!(1)).await {
                Ok(_) => Ok(json!("no injection")),
                Err(Injected(e)) => {
                    y.yield_value(json!(format!("caught {e}"))).await?;
                    Ok(Value::Null)
                }
            }
        });

        seq.resume(Value::Null).await.unwrap();
        assert_eq!(
            seq.raise("boom".into()).await.unwrap(),
            SequenceStep::yielded(json!("caught boom"))
        );
    }

    #[tokio::test]
    async fn injected_error_propagates_out_of_body() {
        let mut seq = Coroutine::new(|mut y| async move {
            y.yield_value(json!(1)).await?;
            Ok(Value::Null)
        });

        seq.resume(Value::Null).await.unwrap();
        assert_eq!(seq.raise("boom".into()).await.unwrap_err(), "boom");
    }

    #[tokio::test]
    async fn raise_before_start_fails_without_running_body() {
        let started = Arc::new(AtomicBool::new(false));
        let flag = started.clone();
        let mut seq = Coroutine::new(move |mut y| async move {
            flag.store(true, Ordering::SeqCst);
            y.yield_value(json!(1)).await?;
            Ok(Value::Null)
        });

        assert_eq!(seq.raise("early".into()).await.unwrap_err(), "early");
        assert!(!started.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn finish_completes_with_supplied_value() {
        let mut seq = Coroutine::new(|mut y| async move {
            y.yield_value(json!(1)).await?;
            y.yield_value(json!(2)).await?;
            Ok(Value::Null)
        });

        seq.resume(Value::Null).await.unwrap();
        assert_eq!(
            seq.finish(json!(7)).await.unwrap(),
            SequenceStep::done(json!(7))
        );
    }

    #[tokio::test]
    async fn body_failure_surfaces_as_error() {
        let mut seq = Coroutine::new(|mut y| async move {
            y.yield_value(json!(1)).await?;
            Err("kaboom".into())
        });

        seq.resume(Value::Null).await.unwrap();
        assert_eq!(seq.resume(Value::Null).await.unwrap_err(), "kaboom");
    }
}
