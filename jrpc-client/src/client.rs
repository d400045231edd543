//! Caller-facing client
//!
//! `RpcClient` turns calls into wire messages, registers them with its
//! [`CallTracker`] and hands them to a [`Transport`]. It never reads from
//! the transport itself: whoever owns the inbound side routes replies back
//! through the tracker (see [`RpcClient::tracker`]), usually by installing
//! it as the dispatcher's reply router.
//!
//! # Cloning
//!
//! `RpcClient` is cheaply cloneable. All clones share the tracker, the id
//! generator and the transport.

use crate::batch::{BatchEntry, BatchHandles, BatchRequest};
use crate::ids::{IdGenerator, SequentialIds};
use crate::tracker::{CallHandle, CallTracker};
use jrpc_core::{
    codec, EngineMetrics, Error, Id, Message, Notification, Params, Request, Result, Transport,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Default per-call deadline
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Builder for [`RpcClient`]
pub struct RpcClientBuilder {
    default_timeout: Option<Duration>,
    ids: Option<Arc<dyn IdGenerator>>,
    metrics: Option<Arc<EngineMetrics>>,
    tracker: Option<CallTracker>,
}

impl RpcClientBuilder {
    pub fn new() -> Self {
        Self {
            default_timeout: Some(DEFAULT_TIMEOUT),
            ids: None,
            metrics: None,
            tracker: None,
        }
    }

    /// Deadline applied by [`RpcClient::call`]; `None` waits forever
    pub fn default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
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

    /// Share an existing tracker instead of creating one
    pub fn tracker(mut self, tracker: CallTracker) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn build(self, transport: Arc<dyn Transport>) -> RpcClient {
        let tracker = match (self.tracker, &self.metrics) {
            (Some(tracker), _) => tracker,
            (None, Some(metrics)) => CallTracker::new().with_metrics(metrics.clone()),
            (None, None) => CallTracker::new(),
        };

        RpcClient {
            transport,
            tracker,
            ids: self.ids.unwrap_or_else(|| Arc::new(SequentialIds::new())),
            default_timeout: self.default_timeout,
        }
    }
}

impl Default for RpcClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Issues calls and notifications to a remote peer
#[derive(Clone)]
pub struct RpcClient {
    transport: Arc<dyn Transport>,
    tracker: CallTracker,
    ids: Arc<dyn IdGenerator>,
    default_timeout: Option<Duration>,
}

impl RpcClient {
    /// Client with default settings
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        RpcClientBuilder::new().build(transport)
    }

    pub fn builder() -> RpcClientBuilder {
        RpcClientBuilder::new()
    }

    pub fn tracker(&self) -> &CallTracker {
        &self.tracker
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }

    pub async fn is_closed(&self) -> bool {
        self.tracker.is_closed().await
    }

    /// Send a request with the default deadline
    pub async fn call(&self, method: impl Into<String>, params: Option<Params>) -> Result<CallHandle> {
        self.call_with_timeout(method, params, self.default_timeout).await
    }

    /// Send a request with an explicit deadline
    ///
    /// The call is registered before it is sent, so a reply can never beat
    /// its registration. Registration fails with `Shutdown` if the client
    /// was shut down at any point before it, even after the early check.
    /// If the transport refuses the message, the call is forgotten and the
    /// transport error returned.
    #[tracing::instrument(skip(self, method, params), fields(method = tracing::field::Empty))]
    pub async fn call_with_timeout(
        &self,
        method: impl Into<String>,
        params: Option<Params>,
        timeout: Option<Duration>,
    ) -> Result<CallHandle> {
        self.ensure_open().await?;
        let method = method.into();
        tracing::Span::current().record("method", method.as_str());

        let id = self.ids.next_id();
        let handle = self.tracker.register(id.clone(), method.clone(), timeout).await?;

        let request = Message::Request(Request {
            method,
            params,
            id: id.clone(),
        });
        if let Err(e) = self.transport.send(codec::encode(&request)).await {
            self.tracker.discard(&id).await;
            tracing::error!(id = %id, error = %e, "failed to send request");
            return Err(e);
        }

        tracing::debug!(id = %id, "request sent");
        Ok(handle)
    }

    /// Call with serializable params and deserialize the result
    ///
    /// `params` must serialize to an array, an object or null.
    pub async fn request<P, R>(&self, method: impl Into<String>, params: P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let params = Params::from_serialize(params)?;
        self.call(method, params).await?.into_result().await
    }

    /// Send a notification; nothing is tracked and no reply is expected
    pub async fn notify(&self, method: impl Into<String>, params: Option<Params>) -> Result<()> {
        self.ensure_open().await?;
        let notification = Message::Notification(Notification {
            method: method.into(),
            params,
        });
        self.transport.send(codec::encode(&notification)).await
    }

    /// Send a batch as one array
    ///
    /// Every call in the batch is registered before anything is sent. If a
    /// registration or the send fails, the calls registered so far are
    /// forgotten and nothing is left pending.
    #[tracing::instrument(skip(self, batch), fields(batch_size = batch.len()))]
    pub async fn batch(&self, batch: BatchRequest) -> Result<BatchHandles> {
        self.ensure_open().await?;
        if batch.is_empty() {
            return Err(Error::InvalidRequest("batch must not be empty".to_string()));
        }

        let mut handles = Vec::with_capacity(batch.call_count());
        let mut messages = Vec::with_capacity(batch.len());
        for entry in batch.into_entries() {
            match entry {
                BatchEntry::Call { method, params } => {
                    let id = self.ids.next_id();
                    match self
                        .tracker
                        .register(id.clone(), method.clone(), self.default_timeout)
                        .await
                    {
                        Ok(handle) => handles.push(handle),
                        Err(e) => {
                            self.forget(&handles).await;
                            return Err(e);
                        }
                    }
                    messages.push(Message::Request(Request { method, params, id }));
                }
                BatchEntry::Notify { method, params } => {
                    messages.push(Message::Notification(Notification { method, params }));
                }
            }
        }

        if let Err(e) = self.transport.send(codec::encode_batch(&messages)).await {
            self.forget(&handles).await;
            tracing::error!(error = %e, "failed to send batch");
            return Err(e);
        }

        tracing::debug!(calls = handles.len(), "batch sent");
        Ok(BatchHandles::new(handles))
    }

    /// Cancel a pending call locally
    pub async fn cancel(&self, id: &Id) -> bool {
        self.tracker.cancel(id).await
    }

    pub async fn pending_count(&self) -> usize {
        self.tracker.pending_count().await
    }

    pub async fn has_pending(&self) -> bool {
        self.pending_count().await > 0
    }

    /// Refuse new calls and reject every pending one with `Shutdown`
    pub async fn shutdown(&self) -> usize {
        let failed = self.tracker.close().await;
        tracing::info!(failed, "client shut down");
        failed
    }

    async fn ensure_open(&self) -> Result<()> {
        if self.is_closed().await {
            Err(Error::Shutdown)
        } else {
            Ok(())
        }
    }

    async fn forget(&self, handles: &[CallHandle]) {
        for handle in handles {
            self.tracker.discard(handle.id()).await;
        }
    }
}
