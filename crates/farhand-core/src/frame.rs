//! Frame types crossing the channel.
//!
//! One tagged variant covers both directions: a [`Call`] travels from the
//! controller into the execution context, a [`Response`] travels back, and
//! [`Frame::Kill`] requests a graceful shutdown. The in-process transport
//! moves frames as values; the serde derives exist so byte transports can
//! be added without touching the protocol layer.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-call correlation token, unique per dispatcher instance.
///
/// Generated by a monotonically increasing counter starting at 1, never
/// reused within a dispatcher instance.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct CallId(pub(crate) u64);

impl CallId {
    pub fn new(id: u64) -> Self {
        CallId(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rpc{}", self.0)
    }
}

/// Per-generator correlation token, unique per relay instance.
///
/// Relay-local counter, independent of call ids.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct SequenceId(pub(crate) u64);

impl SequenceId {
    pub fn new(id: u64) -> Self {
        SequenceId(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SequenceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "seq{}", self.0)
    }
}

/// Operation requested against a live sequence handle.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum SequenceOp {
    /// Drive the sequence forward, feeding the argument as resumption input.
    Pull,
    /// Finish the sequence early with the argument as its final value.
    Terminate,
    /// Raise the argument as an error at the sequence's suspension point.
    InjectError,
}

/// Tags a call as targeting an established sequence rather than a method body.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct SequenceRef {
    pub id: SequenceId,
    pub op: SequenceOp,
}

/// One step of a pull-based sequence: the produced value plus whether the
/// sequence completed.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct SequenceStep {
    pub value: Value,
    pub done: bool,
}

impl SequenceStep {
    /// A yielded value; the sequence stays live.
    pub fn yielded(value: Value) -> Self {
        SequenceStep { value, done: false }
    }

    /// A completing value; the sequence is finished.
    pub fn done(value: Value) -> Self {
        SequenceStep { value, done: true }
    }

    /// The idempotent tail: `{Null, done:true}`, answered for any operation
    /// against an already-completed sequence.
    pub fn exhausted() -> Self {
        SequenceStep {
            value: Value::Null,
            done: true,
        }
    }
}

/// An outbound call frame.
///
/// Produced by the dispatcher, consumed exactly once by the router. When
/// `sequence` is set, `method` names the originating sequence-producing
/// method and `params` carries the single operation argument.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Call {
    pub id: CallId,
    pub method: String,
    pub params: Vec<Value>,
    pub sequence: Option<SequenceRef>,
}

/// What a successful response carries.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub enum ResponsePayload {
    /// A plain method's value.
    Value(Value),
    /// A pull/terminate step against an established sequence.
    Step(SequenceStep),
    /// The establishing response of a sequence-producing call. The sequence
    /// id appears only here; subsequent frames reference it via
    /// [`SequenceRef`] on the call side.
    Sequence {
        sequence_id: SequenceId,
        step: SequenceStep,
    },
}

/// A response frame. Exactly one is produced per call id.
///
/// Remote failures are serialized to strings before transport; no
/// structured error data crosses the boundary.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Response {
    pub id: CallId,
    pub result: Result<ResponsePayload, String>,
}

impl Response {
    pub fn ok(id: CallId, payload: ResponsePayload) -> Self {
        Response {
            id,
            result: Ok(payload),
        }
    }

    pub fn err(id: CallId, message: impl Into<String>) -> Self {
        Response {
            id,
            result: Err(message.into()),
        }
    }
}

/// One discrete structured message traversing the channel.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub enum Frame {
    Call(Call),
    Response(Response),
    /// Graceful shutdown request. The signal is advisory and uninterpreted
    /// by the router.
    Kill { signal: Option<Value> },
}

/// Serialize a value to the string form used for error transport.
///
/// A JSON string yields its contents verbatim; anything else yields its
/// JSON rendering.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stringify_passes_strings_through() {
        assert_eq!(stringify(&json!("boom")), "boom");
    }

    #[test]
    fn stringify_renders_non_strings_as_json() {
        assert_eq!(stringify(&json!(42)), "42");
        assert_eq!(stringify(&json!({"a": 1})), r#"{"a":1}"#);
        assert_eq!(stringify(&Value::Null), "null");
    }

    #[test]
    fn exhausted_step_is_null_done() {
        let step = SequenceStep::exhausted();
        assert_eq!(step.value, Value::Null);
        assert!(step.done);
    }

    #[test]
    fn frame_round_trips_through_serde() {
        let frame = Frame::Call(Call {
            id: CallId::new(7),
            method: "add".into(),
            params: vec![json!(1), json!(2)],
            sequence: Some(SequenceRef {
                id: SequenceId::new(3),
                op: SequenceOp::Pull,
            }),
        });
        let encoded = serde_json::to_string(&frame).unwrap();
        let decoded: Frame = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, frame);
    }
}
