//! farhand: call functions in an isolated execution context as if they
//! were local asynchronous calls.
//!
//! The controlling side issues calls through a [`Dispatcher`]; the context
//! side serves them from a [`MethodRegistry`] behind a [`Router`]. The two
//! sides share no memory and communicate only via frames over a
//! [`Transport`](farhand_core::Transport). Sequence-producing methods are
//! relayed lazily: the consumer pulls values one at a time through a
//! [`SequenceProxy`], and may terminate early or inject an error, each
//! operation flowing as a discrete call/response pair.
//!
//! # Example
//!
//! ```ignore
//! let mut registry = MethodRegistry::new();
//! registry.register("add", |params| async move {
//!     let a = params[0].as_i64().ok_or("bad arg")?;
//!     let b = params[1].as_i64().ok_or("bad arg")?;
//!     Ok(json!(a + b))
//! });
//! registry.register_sequence("count", |params, mut y| async move {
//!     for i in 0..params[0].as_i64().unwrap_or(0) {
//!         y.yield_value(json!(i)).await?;
//!     }
//!     Ok(Value::Null)
//! });
//!
//! let worker = Worker::spawn(registry);
//! let add = worker.remote("add").unwrap();
//! let Reply::Value(sum) = add.invoke(vec![json!(3), json!(9)]).await? else {
//!     unreachable!()
//! };
//! ```

#![deny(unsafe_code)]

mod coroutine;
mod dispatcher;
mod proxy;
mod registry;
mod relay;
mod router;
mod worker;

pub use coroutine::{Coroutine, Injected, Yielder};
pub use dispatcher::{Dispatcher, Reply};
pub use proxy::SequenceProxy;
pub use registry::{Method, MethodRegistry, PlainMethod, SequenceFactory};
pub use relay::GeneratorRelay;
pub use router::Router;
pub use worker::{RemoteMethod, Worker, WorkerConfig, WorkerReply};

pub use farhand_core::{
    stringify, Call, CallId, Frame, LazySequence, Response, ResponsePayload, RpcError, SequenceId,
    SequenceOp, SequenceRef, SequenceResult, SequenceStep, Transport,
};
