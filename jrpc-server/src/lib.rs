//! Inbound side of the jrpc engine
//!
//! - **handler**: the `Handler` capability and constructors for it
//! - **registry**: name → handler table with parameter conventions
//! - **dispatcher**: classifies inbound values, runs handlers, builds replies
//! - **batch**: per-element processing of inbound batch arrays
//!
//! The dispatcher is transport agnostic: feed it JSON values, send back
//! whatever it returns.
//!
//! ```rust
//! use jrpc_server::{from_fn, Dispatcher, MethodRegistry, ParamConvention};
//! use jrpc_core::Params;
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> jrpc_core::Result<()> {
//! let registry = MethodRegistry::new();
//! registry
//!     .register(
//!         "echo",
//!         from_fn(|p: Option<Params>| async move {
//!             Ok(p.and_then(|p| p.get_index(0).cloned()).unwrap_or_default())
//!         }),
//!         ParamConvention::Positional,
//!     )
//!     .await?;
//!
//! let dispatcher = Dispatcher::new(registry);
//! let reply = dispatcher
//!     .dispatch(json!({"jsonrpc": "2.0", "method": "echo", "params": [42], "id": 1}))
//!     .await;
//! assert_eq!(reply, Some(json!({"jsonrpc": "2.0", "result": 42, "id": 1})));
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod dispatcher;
pub mod handler;
pub mod registry;

pub use batch::{BatchMode, BatchProcessor};
pub use dispatcher::Dispatcher;
pub use handler::{from_fn, from_typed_fn, Handler, HandlerFuture};
pub use registry::{Method, MethodRegistry, ParamConvention, RegisteredMethod};
