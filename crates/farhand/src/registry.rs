//! Method registry: name → callable, classified at registration.
//!
//! A callable is either *Plain* (produces a value, possibly after awaiting)
//! or *Sequence-producing* (produces a [`LazySequence`] instance). The
//! classification is a tagged variant fixed at registration time; the
//! router never inspects what a callable produced to decide how to route.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use farhand_core::LazySequence;

use crate::coroutine::{Coroutine, Yielder};

/// Boxed plain callable: params in, value (or stringified failure) out.
pub type PlainMethod =
    Box<dyn Fn(Vec<Value>) -> BoxFuture<'static, Result<Value, String>> + Send + Sync>;

/// Boxed sequence factory: params in, live sequence instance out.
pub type SequenceFactory = Box<dyn Fn(Vec<Value>) -> Box<dyn LazySequence> + Send + Sync>;

/// A registered callable, tagged by kind.
pub enum Method {
    Plain(PlainMethod),
    Sequence(SequenceFactory),
}

impl Method {
    /// Kind name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Method::Plain(_) => "plain",
            Method::Sequence(_) => "sequence",
        }
    }
}

/// Mapping from method name to callable.
///
/// Built by the controlling code, then handed to the router. Immutable
/// after handoff: the router only reads it.
#[derive(Default)]
pub struct MethodRegistry {
    methods: HashMap<String, Method>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plain method. The callable receives the params in
    /// declaration order and produces a value or a stringified failure.
    pub fn register<F, Fut>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, String>> + Send + 'static,
    {
        let boxed: PlainMethod = Box::new(move |params| Box::pin(f(params)));
        self.methods.insert(name.into(), Method::Plain(boxed));
    }

    /// Register a sequence-producing method.
    ///
    /// The body receives the call params and a [`Yielder`]; each
    /// `yield_value` suspends until the consumer pulls again. Invoking the
    /// method creates the instance but does not run the body — that waits
    /// for the first pull.
    pub fn register_sequence<F, Fut>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(Vec<Value>, Yielder) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, String>> + Send + 'static,
    {
        let f = Arc::new(f);
        let factory: SequenceFactory = Box::new(move |params| {
            let f = f.clone();
            Box::new(Coroutine::new(move |yielder| f(params, yielder)))
        });
        self.methods.insert(name.into(), Method::Sequence(factory));
    }

    /// Look up a callable. `None` is surfaced to the controller as
    /// `NO_SUCH_METHOD`; nothing is allocated for the failed lookup.
    pub fn lookup(&self, name: &str) -> Option<&Method> {
        self.methods.get(name)
    }

    /// Registered names, in arbitrary order. This is the exports table the
    /// controller captures at spawn time.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}
