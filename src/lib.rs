//! jrpc - transport-agnostic JSON-RPC 2.0
//!
//! This is the convenience crate re-exporting the jrpc sub-crates, plus the
//! symmetric [`Endpoint`] that serves methods and issues calls over a single
//! transport.
//!
//! # Architecture
//!
//! - **jrpc-core**: message model, codec, errors, transport traits, telemetry
//! - **jrpc-server**: method registry, dispatcher, inbound batches
//! - **jrpc-client**: call tracking, ids, outbound calls and batches
//! - **jrpc-macros**: the `#[handler]` attribute
//!
//! # Quick Start
//!
//! ```rust
//! use jrpc::{connected_pair, from_fn, ParamConvention, Params};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> jrpc::Result<()> {
//! let (server, client) = connected_pair();
//! server
//!     .register(
//!         "echo",
//!         from_fn(|p: Option<Params>| async move {
//!             Ok(p.and_then(|p| p.get_index(0).cloned()).unwrap_or_default())
//!         }),
//!         ParamConvention::Positional,
//!     )
//!     .await?;
//!
//! let result = client.call("echo", Some(Params::from(vec![json!(42)]))).await?.await?;
//! assert_eq!(result, json!(42));
//! # Ok(())
//! # }
//! ```

mod endpoint;

pub use jrpc_client as client;
pub use jrpc_core as core;
pub use jrpc_macros as macros;
pub use jrpc_server as server;

pub use endpoint::{connected_pair, connected_pair_with, Endpoint, EndpointBuilder};
pub use jrpc_client::{BatchHandles, BatchRequest, CallHandle, RpcClient};
pub use jrpc_core::{
    init_telemetry, ChannelTransport, EngineMetrics, Error, ErrorObject, Id, Message, Params,
    Result, TelemetryConfig, Transport,
};
pub use jrpc_macros::handler;
pub use jrpc_server::{from_fn, from_typed_fn, BatchMode, Dispatcher, Method, MethodRegistry, ParamConvention};
