//! Boundaries between the engine and the outside world
//!
//! The engine never touches sockets. It hands finished JSON values to a
//! [`Transport`] and is fed inbound values by whoever owns the transport.
//! Replies that arrive on the inbound path are passed to a [`ReplyRouter`],
//! which is how the dispatcher reaches the call tracker without depending
//! on it.

use crate::error::{Error, ErrorObject, Result};
use crate::types::Id;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

/// Outbound half of a transport
///
/// Implementations deliver one complete JSON document (a message or a batch
/// array) to the peer. Framing and byte-level encoding are up to them.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, message: Value) -> Result<()>;
}

/// Receiver of replies found on the inbound path
#[async_trait]
pub trait ReplyRouter: Send + Sync {
    /// Complete the pending call registered under `id`
    ///
    /// Returns `false` when nothing was waiting for that id, in which case
    /// the reply is stale or duplicated and the caller drops it.
    async fn route_reply(&self, id: Id, outcome: std::result::Result<Value, ErrorObject>) -> bool;
}

/// In-process transport backed by an unbounded channel
///
/// Every sent value shows up on the receiver returned by [`ChannelTransport::new`].
/// Useful for wiring two engines together in one process and for tests.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<Value>,
}

impl ChannelTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Value>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&self, message: Value) -> Result<()> {
        self.tx
            .send(message)
            .map_err(|_| Error::Transport("channel receiver dropped".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_channel_transport_delivers_in_order() {
        let (transport, mut rx) = ChannelTransport::new();
        transport.send(json!(1)).await.unwrap();
        transport.send(json!([2])).await.unwrap();

        assert_eq!(rx.recv().await, Some(json!(1)));
        assert_eq!(rx.recv().await, Some(json!([2])));
    }

    #[tokio::test]
    async fn test_channel_transport_reports_closed_receiver() {
        let (transport, rx) = ChannelTransport::new();
        drop(rx);

        assert!(transport.is_closed());
        let err = transport.send(json!({})).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }
}
