//! Symmetric endpoint
//!
//! An [`Endpoint`] is both sides of a JSON-RPC connection at once: it
//! serves its own registry and issues calls to the peer over the same
//! transport. Every inbound message goes through [`Endpoint::deliver`],
//! which dispatches requests and notifications and hands replies to the
//! endpoint's call tracker.
//!
//! The transport owner decides how inbound messages reach `deliver`. A
//! handler that itself calls the peer must not block the task delivering
//! the peer's reply, so deliver each inbound message on its own task (as
//! [`connected_pair`] does) if handlers make nested calls.

use jrpc_client::{
    BatchHandles, BatchRequest, CallHandle, IdGenerator, RpcClient, RpcClientBuilder,
    DEFAULT_TIMEOUT,
};
use jrpc_core::{ChannelTransport, EngineMetrics, Id, Params, Result, Transport};
use jrpc_server::{BatchMode, BatchProcessor, Dispatcher, Handler, Method, MethodRegistry, ParamConvention};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc;

/// Builder for [`Endpoint`]
pub struct EndpointBuilder {
    default_timeout: Option<Duration>,
    batch_mode: BatchMode,
    max_batch_size: Option<usize>,
    ids: Option<Arc<dyn IdGenerator>>,
    metrics: Option<Arc<EngineMetrics>>,
    registry: Option<MethodRegistry>,
}

impl EndpointBuilder {
    pub fn new() -> Self {
        Self {
            default_timeout: Some(DEFAULT_TIMEOUT),
            batch_mode: BatchMode::default(),
            max_batch_size: None,
            ids: None,
            metrics: None,
            registry: None,
        }
    }

    /// Deadline for outbound calls; `None` waits forever
    pub fn default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn batch_mode(mut self, mode: BatchMode) -> Self {
        self.batch_mode = mode;
        self
    }

    /// Largest inbound batch accepted; `None` is unlimited
    pub fn max_batch_size(mut self, limit: Option<usize>) -> Self {
        self.max_batch_size = limit;
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn metrics(mut self, metrics: Arc<EngineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Serve an existing registry instead of a fresh one
    pub fn registry(mut self, registry: MethodRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self, transport: Arc<dyn Transport>) -> Endpoint {
        let mut client = RpcClientBuilder::new().default_timeout(self.default_timeout);
        if let Some(ids) = self.ids {
            client = client.id_generator(ids);
        }
        if let Some(metrics) = &self.metrics {
            client = client.metrics(metrics.clone());
        }
        let client = client.build(transport.clone());

        let mut dispatcher = Dispatcher::new(self.registry.unwrap_or_default())
            .with_batch_processor(BatchProcessor::with_limit(self.batch_mode, self.max_batch_size))
            .with_reply_router(Arc::new(client.tracker().clone()));
        if let Some(metrics) = self.metrics {
            dispatcher = dispatcher.with_metrics(metrics);
        }

        Endpoint {
            inner: Arc::new(EndpointInner {
                client,
                dispatcher,
                transport,
            }),
        }
    }
}

impl Default for EndpointBuilder {
    fn default() -> Self {
        Self::new()
    }
}

struct EndpointInner {
    client: RpcClient,
    dispatcher: Dispatcher,
    transport: Arc<dyn Transport>,
}

/// Client and server sharing one transport
#[derive(Clone)]
pub struct Endpoint {
    inner: Arc<EndpointInner>,
}

impl Endpoint {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        EndpointBuilder::new().build(transport)
    }

    pub fn builder() -> EndpointBuilder {
        EndpointBuilder::new()
    }

    pub fn registry(&self) -> &MethodRegistry {
        self.inner.dispatcher.registry()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    pub fn client(&self) -> &RpcClient {
        &self.inner.client
    }

    pub async fn register(
        &self,
        name: impl Into<String>,
        handler: Box<dyn Handler>,
        convention: ParamConvention,
    ) -> Result<()> {
        self.registry().register(name, handler, convention).await
    }

    pub async fn register_method(&self, name: impl Into<String>, method: Method) -> Result<()> {
        self.registry().register_method(name, method).await
    }

    pub async fn unregister(&self, name: &str) -> bool {
        self.registry().unregister(name).await
    }

    pub async fn call(&self, method: impl Into<String>, params: Option<Params>) -> Result<CallHandle> {
        self.inner.client.call(method, params).await
    }

    pub async fn call_with_timeout(
        &self,
        method: impl Into<String>,
        params: Option<Params>,
        timeout: Option<Duration>,
    ) -> Result<CallHandle> {
        self.inner.client.call_with_timeout(method, params, timeout).await
    }

    pub async fn request<P, R>(&self, method: impl Into<String>, params: P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        self.inner.client.request(method, params).await
    }

    pub async fn notify(&self, method: impl Into<String>, params: Option<Params>) -> Result<()> {
        self.inner.client.notify(method, params).await
    }

    pub async fn batch(&self, batch: BatchRequest) -> Result<BatchHandles> {
        self.inner.client.batch(batch).await
    }

    pub async fn cancel(&self, id: &Id) -> bool {
        self.inner.client.cancel(id).await
    }

    /// Process one inbound message and send the reply, if any
    pub async fn deliver(&self, message: Value) -> Result<()> {
        match self.inner.dispatcher.dispatch(message).await {
            Some(reply) => self.inner.transport.send(reply).await,
            None => Ok(()),
        }
    }

    /// Like [`deliver`](Self::deliver) for raw text
    pub async fn deliver_text(&self, text: &str) -> Result<()> {
        match self.inner.dispatcher.dispatch_text(text).await {
            Some(reply) => self.inner.transport.send(reply).await,
            None => Ok(()),
        }
    }

    pub async fn pending_count(&self) -> usize {
        self.inner.client.pending_count().await
    }

    pub async fn has_pending(&self) -> bool {
        self.inner.client.has_pending().await
    }

    /// Reject every pending call with `Shutdown` and refuse new ones
    pub async fn shutdown(&self) -> usize {
        self.inner.client.shutdown().await
    }

    fn downgrade(&self) -> Weak<EndpointInner> {
        Arc::downgrade(&self.inner)
    }
}

/// Two default endpoints wired to each other in memory
pub fn connected_pair() -> (Endpoint, Endpoint) {
    connected_pair_with(EndpointBuilder::new(), EndpointBuilder::new())
}

/// Two endpoints wired to each other in memory
///
/// Whatever one endpoint sends is delivered to the other, each message on
/// its own task. The pumps stop once either endpoint is dropped. Must be
/// called from within a Tokio runtime.
pub fn connected_pair_with(a: EndpointBuilder, b: EndpointBuilder) -> (Endpoint, Endpoint) {
    let (to_b, from_a) = ChannelTransport::new();
    let (to_a, from_b) = ChannelTransport::new();

    let a = a.build(Arc::new(to_b));
    let b = b.build(Arc::new(to_a));

    tokio::spawn(pump(from_a, b.downgrade()));
    tokio::spawn(pump(from_b, a.downgrade()));

    (a, b)
}

async fn pump(mut inbound: mpsc::UnboundedReceiver<Value>, peer: Weak<EndpointInner>) {
    while let Some(message) = inbound.recv().await {
        let Some(inner) = peer.upgrade() else {
            break;
        };
        let endpoint = Endpoint { inner };
        tokio::spawn(async move {
            if let Err(e) = endpoint.deliver(message).await {
                tracing::warn!(error = %e, "failed to send reply");
            }
        });
    }
    tracing::debug!("channel pump stopped");
}
