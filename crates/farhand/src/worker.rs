//! Worker facade: a spawned execution context plus its controller handle.
//!
//! Wires a [`Router`] (the context) and a [`Dispatcher`] (the controller)
//! across an in-process transport pair. The two sides share no state;
//! everything crosses as frames.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use farhand_core::{Frame, RpcError, Transport};
use farhand_transport_mem::InProcTransport;

use crate::dispatcher::{Dispatcher, Reply};
use crate::registry::MethodRegistry;
use crate::router::Router;

/// Configuration for a worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// How long a graceful kill waits for in-flight work before tearing
    /// the context down. Default: 100ms.
    pub kill_grace: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig {
            kill_grace: Duration::from_millis(100),
        }
    }
}

/// What a worker call resolves to.
pub type WorkerReply = Reply<InProcTransport>;

/// A spawned execution context and the controller-side handle to it.
pub struct Worker {
    dispatcher: Arc<Dispatcher<InProcTransport>>,
    exports: HashSet<String>,
    router_task: JoinHandle<()>,
    demux_task: JoinHandle<()>,
    config: WorkerConfig,
}

/// A controller-side stand-in for one exported method.
#[derive(Clone)]
pub struct RemoteMethod {
    dispatcher: Arc<Dispatcher<InProcTransport>>,
    name: String,
}

impl RemoteMethod {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the method with the given params. Resolves to a plain value
    /// or a sequence proxy depending on the method's kind.
    pub async fn invoke(&self, params: Vec<Value>) -> Result<WorkerReply, RpcError> {
        let payload = self.dispatcher.call(&self.name, params, None).await?;
        Ok(Reply::resolve(&self.dispatcher, &self.name, payload))
    }
}

impl Worker {
    /// Spawn an execution context serving `registry`.
    pub fn spawn(registry: MethodRegistry) -> Worker {
        Self::spawn_with_config(registry, WorkerConfig::default())
    }

    /// Spawn with a custom configuration.
    ///
    /// Must be called within a tokio runtime.
    pub fn spawn_with_config(registry: MethodRegistry, config: WorkerConfig) -> Worker {
        // The exports table is captured before handoff; only these names
        // are reachable through `remote`.
        let exports: HashSet<String> = registry.names().map(str::to_owned).collect();

        let (near, far) = InProcTransport::pair();
        let router = Router::new(Arc::new(far), registry);
        let router_task = tokio::spawn(async move {
            if let Err(e) = router.run().await {
                debug!(error = %e, "router stopped on transport error");
            }
        });

        let dispatcher = Arc::new(Dispatcher::new(Arc::new(near)));
        let demux = dispatcher.clone();
        let demux_task = tokio::spawn(async move {
            if let Err(e) = demux.run().await {
                // Protocol violations are never silently swallowed.
                error!(error = %e, "dispatcher demux failed");
                panic!("protocol violation: {e}");
            }
        });

        Worker {
            dispatcher,
            exports,
            router_task,
            demux_task,
            config,
        }
    }

    /// Names exported by the context, i.e. every registered method.
    pub fn exports(&self) -> impl Iterator<Item = &str> {
        self.exports.iter().map(String::as_str)
    }

    /// Get a stand-in for an exported method. Non-exported names are
    /// absent, not erroring.
    pub fn remote(&self, name: &str) -> Option<RemoteMethod> {
        self.exports.contains(name).then(|| RemoteMethod {
            dispatcher: self.dispatcher.clone(),
            name: name.to_owned(),
        })
    }

    /// Raw dispatch by name, bypassing the exports table. Unknown names
    /// reject with `NO_SUCH_METHOD` from the far side.
    pub async fn call(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<WorkerReply, RpcError> {
        let payload = self.dispatcher.call(method, params, None).await?;
        Ok(Reply::resolve(&self.dispatcher, method, payload))
    }

    /// Calls issued but not yet answered.
    pub fn outstanding(&self) -> usize {
        self.dispatcher.outstanding()
    }

    /// Graceful shutdown: send a kill frame, give in-flight work the
    /// configured grace window to finish and flush responses, then tear
    /// the context down.
    pub async fn kill(&self, signal: Option<Value>) {
        debug!(?signal, "killing worker");
        let _ = self.dispatcher.transport().send(Frame::Kill { signal }).await;
        tokio::time::sleep(self.config.kill_grace).await;
        self.teardown();
    }

    /// Abrupt termination. Pending calls settle with `ChannelClosed`; no
    /// guarantee in-flight work completes.
    pub fn terminate(&self) {
        debug!("terminating worker");
        self.teardown();
    }

    fn teardown(&self) {
        self.dispatcher.transport().close();
        self.router_task.abort();
        self.demux_task.abort();
        // The demux loop may have been aborted before it could observe the
        // close, so outstanding calls are settled here as well.
        self.dispatcher.abandon_pending();
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.teardown();
    }
}
