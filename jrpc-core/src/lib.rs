//! Core types for the jrpc JSON-RPC 2.0 engine
//!
//! This crate holds everything both sides of a connection share:
//!
//! - **types**: the four message shapes, request ids and params
//! - **codec**: validation and conversion between JSON values and messages
//! - **error**: the local error enum and the wire error object
//! - **transport**: the `Transport` and `ReplyRouter` boundaries, plus an
//!   in-process channel transport
//! - **metrics** and **telemetry**: OpenTelemetry instruments and setup
//!
//! The engine never parses bytes or owns sockets. It consumes and produces
//! [`serde_json::Value`]s and leaves framing to the transport.
//!
//! # Example
//!
//! ```rust
//! use jrpc_core::{codec, Id, Message, Params, Request};
//! use serde_json::json;
//!
//! let request = Request::new("add", Some(Params::Positional(vec![json!(1), json!(2)])), Id::Number(1));
//! let value = codec::encode(&Message::Request(request));
//! assert_eq!(value, json!({"jsonrpc": "2.0", "method": "add", "params": [1, 2], "id": 1}));
//! ```

pub mod codec;
pub mod error;
pub mod metrics;
pub mod telemetry;
pub mod transport;
pub mod types;

pub use codec::Incoming;
pub use error::{DecodeError, DecodeErrorKind, Error, ErrorCode, ErrorObject, Result};
pub use metrics::EngineMetrics;
pub use telemetry::{init_telemetry, TelemetryConfig, TelemetryGuard};
pub use transport::{ChannelTransport, ReplyRouter, Transport};
pub use types::{
    ErrorResponse, Id, Message, Notification, Params, Request, Response, JSONRPC_VERSION,
};
