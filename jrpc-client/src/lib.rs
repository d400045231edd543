//! Outbound side of the jrpc engine
//!
//! - **ids**: request id strategies
//! - **tracker**: the pending call table and per-call handles
//! - **client**: `RpcClient`, which issues calls and notifications
//! - **batch**: outbound batches and their handles
//!
//! The client writes to a [`Transport`](jrpc_core::Transport) and leaves
//! reading to its owner. Replies get back to callers through the
//! [`CallTracker`], which implements [`ReplyRouter`](jrpc_core::ReplyRouter).
//!
//! ```rust
//! use jrpc_client::RpcClient;
//! use jrpc_core::{ChannelTransport, Id, Params};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> jrpc_core::Result<()> {
//! let (transport, mut outbound) = ChannelTransport::new();
//! let client = RpcClient::new(Arc::new(transport));
//!
//! let handle = client.call("echo", Some(Params::from(vec![json!(42)]))).await?;
//! let sent = outbound.recv().await.unwrap();
//!
//! // Whatever reads the peer's reply hands it to the tracker
//! let id = Id::from_value(&sent["id"]).unwrap();
//! client.tracker().resolve(&id, json!(42)).await;
//! assert_eq!(handle.await?, json!(42));
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod client;
pub mod ids;
pub mod tracker;

pub use batch::{BatchHandles, BatchRequest};
pub use client::{RpcClient, RpcClientBuilder, DEFAULT_TIMEOUT};
pub use ids::{IdGenerator, RandomIds, SequentialIds};
pub use tracker::{CallHandle, CallTracker, PendingCallInfo};
