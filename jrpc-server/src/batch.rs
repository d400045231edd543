//! Inbound batch processing
//!
//! Each element of a batch array is decoded and dispatched on its own. A bad
//! element gets its own error reply in the output and never affects its
//! neighbours. Notifications and inbound responses contribute nothing, so a
//! batch made only of them yields an empty reply list and nothing is sent.
//!
//! Replies come back in the order of the elements that produced them, in
//! both modes. Every element carrying an id appears in the output exactly
//! once, with one exception below.
//!
//! # Modes
//!
//! - **Parallel** (default): elements run concurrently on the delivering task
//! - **Sequential**: elements run one after another
//!
//! # Size limit
//!
//! The limit is off by default. When set, a batch longer than the limit is
//! rejected whole: the output is a single Invalid Request reply with a null
//! id, and no element is decoded or run. This overrides the one reply per
//! id rule above, so a caller whose requests were in that batch never gets
//! a reply addressed to them and sees its calls time out.

use crate::dispatcher::Dispatcher;
use futures::future::join_all;
use jrpc_core::{codec, Error, ErrorObject, ErrorResponse, Id, Message};
use serde_json::Value;

/// How the elements of one batch are run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchMode {
    #[default]
    Parallel,
    Sequential,
}

impl BatchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            BatchMode::Parallel => "parallel",
            BatchMode::Sequential => "sequential",
        }
    }
}

/// Batch execution settings
#[derive(Debug, Clone, Default)]
pub struct BatchProcessor {
    mode: BatchMode,
    max_size: Option<usize>,
}

impl BatchProcessor {
    pub fn new(mode: BatchMode) -> Self {
        Self { mode, max_size: None }
    }

    pub fn with_limit(mode: BatchMode, max_size: Option<usize>) -> Self {
        Self { mode, max_size }
    }

    pub fn mode(&self) -> BatchMode {
        self.mode
    }

    pub fn max_size(&self) -> Option<usize> {
        self.max_size
    }

    /// Process the elements of a non-empty batch
    ///
    /// Returns the replies to send, possibly none.
    #[tracing::instrument(skip(self, items, dispatcher), fields(batch_size = items.len(), mode = ?self.mode))]
    pub async fn process(&self, items: Vec<Value>, dispatcher: &Dispatcher) -> Vec<Message> {
        if let Some(limit) = self.max_size {
            if items.len() > limit {
                let err = Error::BatchSizeExceeded {
                    limit,
                    actual: items.len(),
                };
                tracing::warn!(error = %err, "rejecting batch");
                return vec![Message::Error(ErrorResponse::new(
                    Id::Null,
                    ErrorObject::invalid_request(err.to_string()),
                ))];
            }
        }

        if let Some(metrics) = dispatcher.metrics() {
            metrics.record_batch(items.len() as u64, self.mode.as_str());
        }

        let replies: Vec<Message> = match self.mode {
            BatchMode::Parallel => join_all(items.into_iter().map(|item| process_element(item, dispatcher)))
                .await
                .into_iter()
                .flatten()
                .collect(),
            BatchMode::Sequential => {
                let mut replies = Vec::new();
                for item in items {
                    if let Some(reply) = process_element(item, dispatcher).await {
                        replies.push(reply);
                    }
                }
                replies
            }
        };

        tracing::debug!(reply_count = replies.len(), "batch processed");
        replies
    }
}

async fn process_element(item: Value, dispatcher: &Dispatcher) -> Option<Message> {
    match codec::decode_message(item) {
        Ok(message) => dispatcher.dispatch_message(message).await,
        Err(e) => Some(dispatcher.reject(e)),
    }
}
