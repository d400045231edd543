//! Error types for jrpc
//!
//! Two families of errors live here:
//!
//! - **Error**: local faults and handler failures, built with thiserror
//! - **ErrorObject**: the `error` member of a JSON-RPC 2.0 reply
//!
//! A third type, [`DecodeError`], describes why an inbound JSON value could
//! not be turned into a message. It always carries enough information to
//! build the reply the peer must receive.
//!
//! # Standard codes
//!
//! - `-32700`: Parse error
//! - `-32600`: Invalid Request
//! - `-32601`: Method not found
//! - `-32602`: Invalid params
//! - `-32603`: Internal error
//!
//! The range `-32768..=-32000` is reserved by the protocol. Application
//! errors should pick codes outside it; the engine forwards them untouched.
//!
//! # Examples
//!
//! ```rust
//! use jrpc_core::{Error, ErrorObject};
//!
//! let wire = ErrorObject::method_not_found("ghost");
//! assert_eq!(wire.code, -32601);
//!
//! // Handler failures collapse onto the wire error the peer will see
//! let err = Error::Internal("disk full".into());
//! assert_eq!(err.to_error_object().code, -32603);
//! ```

use crate::types::Id;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Result type used across the jrpc crates
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the engine to local code
///
/// Variants split into two groups. Handler-facing variants (`Rpc`,
/// `InvalidParams`, `MethodNotFound`, `Internal`, `Serialization`) are what a
/// method implementation returns and get converted into an [`ErrorObject`]
/// by [`Error::to_error_object`]. The remaining variants are local-only
/// faults and never reach the wire.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// A structured JSON-RPC error object
    ///
    /// Returned by handlers that want a specific code on the wire, and
    /// produced by the call tracker when the peer answers with an error.
    #[error("rpc error: {0}")]
    Rpc(#[from] ErrorObject),

    /// Converting between Rust types and JSON failed
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A message or batch could not be built as requested
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Parameters did not match what the method expects
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// No method registered under this name
    #[error("method not found: {0}")]
    MethodNotFound(String),

    /// Unexpected failure inside a handler
    #[error("internal error: {0}")]
    Internal(String),

    /// `register` was called with a name that is already bound
    #[error("method already registered: {0}")]
    DuplicateMethod(String),

    /// An id was allocated while a call with the same id is still pending
    #[error("request id {0} is already pending")]
    IdCollision(Id),

    /// The deadline elapsed before a reply arrived
    #[error("request timed out")]
    Timeout,

    /// The pending call was cancelled locally
    #[error("request cancelled")]
    Cancelled,

    /// The transport refused or failed to send a message
    #[error("transport error: {0}")]
    Transport(String),

    /// The endpoint or client has been shut down
    #[error("endpoint shut down")]
    Shutdown,

    /// Batch size exceeds configured limit
    #[error("batch size {actual} exceeds limit of {limit}")]
    BatchSizeExceeded { limit: usize, actual: usize },
}

impl Error {
    /// Map this error onto the wire error a peer should receive
    ///
    /// Application error objects pass through unmodified. Parameter and
    /// lookup failures keep their standard codes. Anything else is reported
    /// as `-32603` with the local diagnostic attached as `data`.
    pub fn to_error_object(&self) -> ErrorObject {
        match self {
            Error::Rpc(obj) => obj.clone(),
            Error::InvalidParams(reason) => ErrorObject::invalid_params(reason.clone()),
            Error::MethodNotFound(method) => ErrorObject::method_not_found(method),
            other => ErrorObject::internal_error(other.to_string()),
        }
    }

    /// The JSON-RPC code carried by this error, if it came from the wire
    pub fn rpc_code(&self) -> Option<i32> {
        match self {
            Error::Rpc(obj) => Some(obj.code),
            _ => None,
        }
    }

    /// Whether this is a local-only fault that never reaches the wire
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Error::Timeout
                | Error::Cancelled
                | Error::DuplicateMethod(_)
                | Error::IdCollision(_)
                | Error::Shutdown
                | Error::Transport(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// The five error codes defined by JSON-RPC 2.0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
}

impl ErrorCode {
    /// Numeric value placed on the wire
    pub const fn code(self) -> i32 {
        match self {
            ErrorCode::ParseError => -32700,
            ErrorCode::InvalidRequest => -32600,
            ErrorCode::MethodNotFound => -32601,
            ErrorCode::InvalidParams => -32602,
            ErrorCode::InternalError => -32603,
        }
    }

    /// Canonical message text for the code
    pub const fn message(self) -> &'static str {
        match self {
            ErrorCode::ParseError => "Parse error",
            ErrorCode::InvalidRequest => "Invalid Request",
            ErrorCode::MethodNotFound => "Method not found",
            ErrorCode::InvalidParams => "Invalid params",
            ErrorCode::InternalError => "Internal error",
        }
    }

    /// Look up a standard code by its numeric value
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -32700 => Some(ErrorCode::ParseError),
            -32600 => Some(ErrorCode::InvalidRequest),
            -32601 => Some(ErrorCode::MethodNotFound),
            -32602 => Some(ErrorCode::InvalidParams),
            -32603 => Some(ErrorCode::InternalError),
            _ => None,
        }
    }
}

/// Lower bound of the code range reserved by the protocol
pub const RESERVED_CODE_MIN: i32 = -32768;
/// Upper bound of the code range reserved by the protocol
pub const RESERVED_CODE_MAX: i32 = -32000;

/// The `error` member of a JSON-RPC error response
///
/// ```json
/// {"code": -32601, "message": "Method not found", "data": "ghost"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorObject {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Attach a `data` member
    pub fn with_data(mut self, data: impl Into<Value>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Build the error object for one of the standard codes
    pub fn standard(code: ErrorCode) -> Self {
        Self::new(code.code(), code.message())
    }

    pub fn parse_error() -> Self {
        Self::standard(ErrorCode::ParseError)
    }

    /// Invalid Request, with the reason as `data`
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::standard(ErrorCode::InvalidRequest).with_data(reason.into())
    }

    /// Method not found, with the method name as `data`
    pub fn method_not_found(method: &str) -> Self {
        Self::standard(ErrorCode::MethodNotFound).with_data(method)
    }

    pub fn invalid_params(reason: impl Into<String>) -> Self {
        Self::standard(ErrorCode::InvalidParams).with_data(reason.into())
    }

    pub fn internal_error(diagnostic: impl Into<String>) -> Self {
        Self::standard(ErrorCode::InternalError).with_data(diagnostic.into())
    }

    /// The standard code this object carries, if any
    pub fn standard_code(&self) -> Option<ErrorCode> {
        ErrorCode::from_code(self.code)
    }

    /// Whether the code falls in the range reserved by the protocol
    pub fn is_reserved_code(&self) -> bool {
        (RESERVED_CODE_MIN..=RESERVED_CODE_MAX).contains(&self.code)
    }
}

impl std::fmt::Display for ErrorObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ErrorObject {}

/// Which protocol error a [`DecodeError`] maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// The value is not something a message can be read from at all
    Parse,
    /// The value is shaped like a message but breaks a protocol rule
    InvalidRequest,
}

impl std::fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeErrorKind::Parse => f.write_str("parse error"),
            DecodeErrorKind::InvalidRequest => f.write_str("invalid request"),
        }
    }
}

/// Failure to read a JSON-RPC message from a JSON value
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: {reason}")]
pub struct DecodeError {
    pub kind: DecodeErrorKind,
    pub reason: String,
    /// Id recovered before the failure was detected
    pub id: Option<Id>,
}

impl DecodeError {
    pub fn parse(reason: impl Into<String>) -> Self {
        Self {
            kind: DecodeErrorKind::Parse,
            reason: reason.into(),
            id: None,
        }
    }

    pub fn invalid_request(reason: impl Into<String>, id: Option<Id>) -> Self {
        Self {
            kind: DecodeErrorKind::InvalidRequest,
            reason: reason.into(),
            id,
        }
    }

    /// The error object to put on the wire
    ///
    /// Parse errors never carry an id, so the recovered id only applies to
    /// invalid requests.
    pub fn to_error_object(&self) -> ErrorObject {
        match self.kind {
            DecodeErrorKind::Parse => ErrorObject::parse_error(),
            DecodeErrorKind::InvalidRequest => ErrorObject::invalid_request(self.reason.clone()),
        }
    }

    /// Id the reply should carry: the recovered id, or null
    pub fn reply_id(&self) -> Id {
        match self.kind {
            DecodeErrorKind::Parse => Id::Null,
            DecodeErrorKind::InvalidRequest => self.id.clone().unwrap_or(Id::Null),
        }
    }
}
