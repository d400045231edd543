//! Outbound batches
//!
//! Collect calls and notifications into a [`BatchRequest`], then hand it to
//! [`RpcClient::batch`](crate::RpcClient::batch). The whole batch goes out
//! as one JSON array; ids are assigned when it is sent.
//!
//! ```rust
//! use jrpc_client::BatchRequest;
//! use jrpc_core::Params;
//! use serde_json::json;
//!
//! let batch = BatchRequest::new()
//!     .call("add", Some(Params::from(vec![json!(1), json!(2)])))
//!     .notify("log", None)
//!     .call("ping", None);
//! assert_eq!(batch.len(), 3);
//! assert_eq!(batch.call_count(), 2);
//! ```

use crate::tracker::CallHandle;
use futures::future::join_all;
use jrpc_core::{Id, Params, Result};
use serde_json::Value;

#[derive(Debug, Clone)]
pub(crate) enum BatchEntry {
    Call { method: String, params: Option<Params> },
    Notify { method: String, params: Option<Params> },
}

/// Calls and notifications to send as a single batch
#[derive(Debug, Clone, Default)]
pub struct BatchRequest {
    entries: Vec<BatchEntry>,
}

impl BatchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a call; its handle appears in [`BatchHandles`] in call order
    pub fn call(mut self, method: impl Into<String>, params: Option<Params>) -> Self {
        self.entries.push(BatchEntry::Call {
            method: method.into(),
            params,
        });
        self
    }

    /// Add a notification
    pub fn notify(mut self, method: impl Into<String>, params: Option<Params>) -> Self {
        self.entries.push(BatchEntry::Notify {
            method: method.into(),
            params,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries that expect a reply
    pub fn call_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, BatchEntry::Call { .. }))
            .count()
    }

    pub(crate) fn into_entries(self) -> Vec<BatchEntry> {
        self.entries
    }
}

/// Handles for the calls of a sent batch, in the order they were added
#[derive(Debug)]
pub struct BatchHandles {
    handles: Vec<CallHandle>,
}

impl BatchHandles {
    pub(crate) fn new(handles: Vec<CallHandle>) -> Self {
        Self { handles }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn handles(&self) -> &[CallHandle] {
        &self.handles
    }

    pub fn ids(&self) -> Vec<Id> {
        self.handles.iter().map(|h| h.id().clone()).collect()
    }

    pub fn into_handles(self) -> Vec<CallHandle> {
        self.handles
    }

    /// Wait for every call; each result settles independently
    pub async fn join(self) -> Vec<Result<Value>> {
        join_all(self.handles).await
    }
}
