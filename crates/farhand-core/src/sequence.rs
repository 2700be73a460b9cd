//! Lazy-sequence abstraction.
//!
//! A [`LazySequence`] is a pull-based producer of values supporting
//! resume-with-input, early-terminate-with-value, and inject-error. The
//! generator relay owns boxed instances and drives them one operation at a
//! time, so the methods are dyn-safe via boxed futures.

use futures::future::BoxFuture;
use serde_json::Value;

use crate::SequenceStep;

/// Outcome of driving a sequence: the next step, or a stringified failure.
pub type SequenceResult = Result<SequenceStep, String>;

/// A pull-based producer of values.
///
/// The relay guarantees operations are strictly sequential per instance:
/// a second operation is only issued after the previous one's future has
/// settled.
pub trait LazySequence: Send {
    /// Drive the sequence forward, feeding `input` to its suspension
    /// point. Yields `{value, done:false}` while live, `{value, done:true}`
    /// when the body completes.
    fn resume(&mut self, input: Value) -> BoxFuture<'_, SequenceResult>;

    /// Finish the sequence early; it completes with `value`.
    fn finish(&mut self, value: Value) -> BoxFuture<'_, SequenceResult>;

    /// Raise `error` at the sequence's suspension point. The sequence may
    /// catch it and yield again, complete, or fail.
    fn raise(&mut self, error: String) -> BoxFuture<'_, SequenceResult>;
}
