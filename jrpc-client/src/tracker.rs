//! Pending call tracking
//!
//! Every outbound request is registered here before it is sent and stays
//! until exactly one of these happens:
//!
//! 1. a matching response arrives and the call resolves
//! 2. a matching error response arrives and the call is rejected
//! 3. the deadline passes and the call is rejected with `Timeout`
//! 4. the caller cancels it and it is rejected with `Cancelled`
//! 5. the tracker is closed and the call is rejected with `Shutdown`
//!
//! Settling removes the entry while the table lock is held, so whichever
//! path gets there first wins and every later attempt finds nothing. A
//! reply arriving after its call timed out is therefore dropped, as is a
//! second reply for the same id.
//!
//! Closing happens under the same lock as registration: once [`CallTracker::close`]
//! returns, every later `register` fails with `Shutdown`.
//!
//! Deadlines are enforced by a timer task per call. The task is aborted as
//! soon as the call settles some other way. A [`CallHandle`] dropped before
//! its call settles takes the table entry with it.

use futures::FutureExt;
use jrpc_core::{EngineMetrics, Error, ErrorObject, Id, ReplyRouter, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, Mutex};
use tokio::task::AbortHandle;

struct PendingCall {
    method: String,
    registered_at: Instant,
    deadline: Option<Instant>,
    sink: oneshot::Sender<Result<Value>>,
    timer: Option<AbortHandle>,
}

#[derive(Default)]
struct CallTable {
    calls: HashMap<Id, PendingCall>,
    closed: bool,
}

/// Snapshot of one pending call
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCallInfo {
    pub id: Id,
    pub method: String,
    pub registered_at: Instant,
    pub deadline: Option<Instant>,
}

/// Completion of one outbound request
///
/// Await it to get the result. Resolves to `Err(Error::Rpc(..))` when the
/// peer answered with an error, and to `Timeout`, `Cancelled` or `Shutdown`
/// for local outcomes.
///
/// Dropping the handle before it resolves abandons the call: its entry is
/// removed from the tracker and a reply that still arrives is dropped.
pub struct CallHandle {
    id: Id,
    rx: oneshot::Receiver<Result<Value>>,
    tracker: CallTracker,
    finished: bool,
}

impl CallHandle {
    pub fn id(&self) -> &Id {
        &self.id
    }

    /// Wait for the result and deserialize it
    pub async fn into_result<R: DeserializeOwned>(self) -> Result<R> {
        let value = self.await?;
        Ok(serde_json::from_value(value)?)
    }
}

impl fmt::Debug for CallHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallHandle")
            .field("id", &self.id)
            .field("finished", &self.finished)
            .finish()
    }
}

impl Future for CallHandle {
    type Output = Result<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // A dropped sender means the tracker went away with the call pending.
        let outcome = ready!(self.rx.poll_unpin(cx)).unwrap_or(Err(Error::Shutdown));
        self.finished = true;
        Poll::Ready(outcome)
    }
}

impl Drop for CallHandle {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        // Marks the sink closed so cleanup can tell this call from a newer
        // one registered under the same id.
        self.rx.close();
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let tracker = self.tracker.clone();
        let id = self.id.clone();
        runtime.spawn(async move {
            if tracker.discard_abandoned(&id).await {
                tracing::debug!(id = %id, "abandoned call discarded");
            }
        });
    }
}

/// Table of outbound calls awaiting a reply
#[derive(Clone, Default)]
pub struct CallTracker {
    table: Arc<Mutex<CallTable>>,
    metrics: Option<Arc<EngineMetrics>>,
}

impl CallTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metrics(mut self, metrics: Arc<EngineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Register a call under `id`
    ///
    /// Must be called before the request is handed to the transport. Fails
    /// with `IdCollision` if `id` is still pending and with `Shutdown` once
    /// the tracker is closed. With a `timeout`, the call is rejected with
    /// `Timeout` once it elapses.
    pub async fn register(
        &self,
        id: Id,
        method: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<CallHandle> {
        let method = method.into();
        let mut table = self.table.lock().await;
        if table.closed {
            return Err(Error::Shutdown);
        }
        if table.calls.contains_key(&id) {
            tracing::error!(id = %id, method = %method, "request id already pending");
            return Err(Error::IdCollision(id));
        }

        let (sink, rx) = oneshot::channel();
        let registered_at = Instant::now();
        let timer = timeout.map(|after| {
            let tracker = self.clone();
            let id = id.clone();
            tokio::spawn(async move {
                tokio::time::sleep(after).await;
                if tracker.settle(&id, Err(Error::Timeout)).await {
                    tracing::debug!(id = %id, "call timed out");
                }
            })
            .abort_handle()
        });

        table.calls.insert(
            id.clone(),
            PendingCall {
                method: method.clone(),
                registered_at,
                deadline: timeout.map(|after| registered_at + after),
                sink,
                timer,
            },
        );
        let count = table.calls.len();
        drop(table);

        if let Some(metrics) = &self.metrics {
            metrics.record_call(&method, count);
        }
        Ok(CallHandle {
            id,
            rx,
            tracker: self.clone(),
            finished: false,
        })
    }

    /// Remove the call and complete its handle with `outcome`
    ///
    /// Returns `false` if the call had already settled.
    async fn settle(&self, id: &Id, outcome: Result<Value>) -> bool {
        let (call, remaining) = {
            let mut table = self.table.lock().await;
            let call = table.calls.remove(id);
            (call, table.calls.len())
        };
        let Some(call) = call else {
            return false;
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_settled(
                &call.method,
                outcome_label(&outcome),
                call.registered_at.elapsed().as_secs_f64(),
                remaining,
            );
        }
        // The caller may have dropped its handle; nothing to do then.
        let _ = call.sink.send(outcome);
        if let Some(timer) = call.timer {
            timer.abort();
        }
        true
    }

    /// Resolve a pending call with a result
    pub async fn resolve(&self, id: &Id, result: Value) -> bool {
        self.settle(id, Ok(result)).await
    }

    /// Reject a pending call with the peer's error object
    pub async fn reject(&self, id: &Id, error: ErrorObject) -> bool {
        self.settle(id, Err(Error::Rpc(error))).await
    }

    /// Reject a pending call locally with `Cancelled`
    ///
    /// Nothing is sent to the peer; a reply that still arrives is dropped.
    pub async fn cancel(&self, id: &Id) -> bool {
        let cancelled = self.settle(id, Err(Error::Cancelled)).await;
        if cancelled {
            tracing::debug!(id = %id, "call cancelled");
        }
        cancelled
    }

    /// Forget a call without completing its handle
    ///
    /// Used when the request never made it onto the wire.
    pub async fn discard(&self, id: &Id) -> bool {
        let call = self.table.lock().await.calls.remove(id);
        match call {
            Some(call) => {
                if let Some(timer) = call.timer {
                    timer.abort();
                }
                true
            }
            None => false,
        }
    }

    /// Forget a call whose handle was dropped
    ///
    /// Leaves the entry alone if a live handle owns it.
    async fn discard_abandoned(&self, id: &Id) -> bool {
        let call = {
            let mut table = self.table.lock().await;
            match table.calls.get(id) {
                Some(call) if call.sink.is_closed() => table.calls.remove(id),
                _ => None,
            }
        };
        match call {
            Some(call) => {
                if let Some(timer) = call.timer {
                    timer.abort();
                }
                true
            }
            None => false,
        }
    }

    /// Reject every pending call with `error`, returning how many there were
    ///
    /// The tracker stays open for new calls.
    pub async fn fail_all(&self, error: Error) -> usize {
        let drained: Vec<PendingCall> = {
            let mut table = self.table.lock().await;
            table.calls.drain().map(|(_, call)| call).collect()
        };
        self.reject_drained(drained, &error)
    }

    /// Refuse new calls and reject every pending one with `Shutdown`
    ///
    /// The flag is set and the table drained under one lock, so no call can
    /// slip in between. Returns how many calls were rejected.
    pub async fn close(&self) -> usize {
        let drained: Vec<PendingCall> = {
            let mut table = self.table.lock().await;
            table.closed = true;
            table.calls.drain().map(|(_, call)| call).collect()
        };
        self.reject_drained(drained, &Error::Shutdown)
    }

    pub async fn is_closed(&self) -> bool {
        self.table.lock().await.closed
    }

    fn reject_drained(&self, drained: Vec<PendingCall>, error: &Error) -> usize {
        let count = drained.len();
        for call in drained {
            if let Some(metrics) = &self.metrics {
                metrics.record_settled(
                    &call.method,
                    "failed",
                    call.registered_at.elapsed().as_secs_f64(),
                    0,
                );
            }
            let _ = call.sink.send(Err(error.clone()));
            if let Some(timer) = call.timer {
                timer.abort();
            }
        }
        if count > 0 {
            tracing::debug!(count, error = %error, "failed all pending calls");
        }
        count
    }

    pub async fn pending_count(&self) -> usize {
        self.table.lock().await.calls.len()
    }

    pub async fn is_pending(&self, id: &Id) -> bool {
        self.table.lock().await.calls.contains_key(id)
    }

    pub async fn pending_calls(&self) -> Vec<PendingCallInfo> {
        self.table
            .lock()
            .await
            .calls
            .iter()
            .map(|(id, call)| PendingCallInfo {
                id: id.clone(),
                method: call.method.clone(),
                registered_at: call.registered_at,
                deadline: call.deadline,
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl ReplyRouter for CallTracker {
    async fn route_reply(&self, id: Id, outcome: std::result::Result<Value, ErrorObject>) -> bool {
        self.settle(&id, outcome.map_err(Error::Rpc)).await
    }
}

fn outcome_label(outcome: &Result<Value>) -> &'static str {
    match outcome {
        Ok(_) => "resolved",
        Err(Error::Timeout) => "timeout",
        Err(Error::Cancelled) => "cancelled",
        Err(_) => "rejected",
    }
}
