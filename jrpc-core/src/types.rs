//! JSON-RPC 2.0 message model
//!
//! Every message on the wire is one of four shapes, represented by the
//! [`Message`] sum type:
//!
//! - **Request**: carries a method, optional params and an id; expects one reply
//! - **Notification**: a request without an id; never answered
//! - **Response**: successful reply carrying `result`
//! - **ErrorResponse**: failed reply carrying `error`
//!
//! The types here are plain data. Reading them from and writing them to
//! JSON values is the job of [`crate::codec`], which enforces the protocol's
//! validation rules.

use crate::error::{Error, ErrorObject, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Protocol version marker carried in every message
pub const JSONRPC_VERSION: &str = "2.0";

/// Request identifier
///
/// Ids are opaque correlation tokens. The engine never interprets them
/// beyond equality, and hands them back exactly as received.
///
/// Numeric ids are limited to integers in the `i64` range. A request whose
/// id is fractional or lies outside that range (for example an unsigned
/// value above `i64::MAX`) is rejected as an Invalid Request with a null
/// id, since its id cannot be echoed back faithfully.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    String(String),
    Number(i64),
    Null,
}

impl Id {
    /// Read an id from its JSON representation
    ///
    /// Returns `None` for anything other than a string, an integer that fits
    /// in `i64`, or null.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Id::String(s.clone())),
            Value::Number(n) => n.as_i64().map(Id::Number),
            Value::Null => Some(Id::Null),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Id::String(s) => Value::String(s.clone()),
            Id::Number(n) => Value::from(*n),
            Id::Null => Value::Null,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Id::Null)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::String(s) => write!(f, "\"{}\"", s),
            Id::Number(n) => write!(f, "{}", n),
            Id::Null => write!(f, "null"),
        }
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Id::String(s)
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id::String(s.to_string())
    }
}

impl From<i64> for Id {
    fn from(n: i64) -> Self {
        Id::Number(n)
    }
}

/// Structured request parameters
///
/// JSON-RPC only allows params to be an array (by-position) or an object
/// (by-name). Scalars are not representable here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Params {
    Positional(Vec<Value>),
    Named(Map<String, Value>),
}

impl Params {
    /// Read params from a JSON value, rejecting scalars
    pub fn from_value(value: Value) -> std::result::Result<Self, Value> {
        match value {
            Value::Array(items) => Ok(Params::Positional(items)),
            Value::Object(map) => Ok(Params::Named(map)),
            other => Err(other),
        }
    }

    /// Serialize any value into params
    ///
    /// Sequences become positional params, structs and maps become named
    /// params, and `()`/`None` become absent params.
    pub fn from_serialize<T: Serialize>(value: T) -> Result<Option<Self>> {
        match serde_json::to_value(value)? {
            Value::Null => Ok(None),
            other => Params::from_value(other).map(Some).map_err(|scalar| {
                Error::InvalidParams(format!("params must be an array or object, got {}", scalar))
            }),
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Params::Positional(items) => Value::Array(items),
            Params::Named(map) => Value::Object(map),
        }
    }

    pub fn to_value(&self) -> Value {
        self.clone().into_value()
    }

    pub fn is_positional(&self) -> bool {
        matches!(self, Params::Positional(_))
    }

    pub fn is_named(&self) -> bool {
        matches!(self, Params::Named(_))
    }

    /// Positional argument at `index`
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        match self {
            Params::Positional(items) => items.get(index),
            Params::Named(_) => None,
        }
    }

    /// Named argument `key`
    pub fn get_named(&self, key: &str) -> Option<&Value> {
        match self {
            Params::Named(map) => map.get(key),
            Params::Positional(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Params::Positional(items) => items.len(),
            Params::Named(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deserialize params into a concrete type
    ///
    /// Failures are reported as `InvalidParams`.
    pub fn parse<T: DeserializeOwned>(self) -> Result<T> {
        serde_json::from_value(self.into_value()).map_err(|e| Error::InvalidParams(e.to_string()))
    }
}

impl From<Vec<Value>> for Params {
    fn from(items: Vec<Value>) -> Self {
        Params::Positional(items)
    }
}

impl From<Map<String, Value>> for Params {
    fn from(map: Map<String, Value>) -> Self {
        Params::Named(map)
    }
}

/// A call expecting exactly one reply
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: String,
    pub params: Option<Params>,
    pub id: Id,
}

impl Request {
    pub fn new(method: impl Into<String>, params: Option<Params>, id: impl Into<Id>) -> Self {
        Self {
            method: method.into(),
            params,
            id: id.into(),
        }
    }
}

/// A call that is never answered
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub method: String,
    pub params: Option<Params>,
}

impl Notification {
    pub fn new(method: impl Into<String>, params: Option<Params>) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }
}

/// Successful reply to a request
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub id: Id,
    pub result: Value,
}

impl Response {
    pub fn new(id: Id, result: Value) -> Self {
        Self { id, result }
    }
}

/// Failed reply to a request
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    pub id: Id,
    pub error: ErrorObject,
}

impl ErrorResponse {
    pub fn new(id: Id, error: ErrorObject) -> Self {
        Self { id, error }
    }
}

/// Any single JSON-RPC message
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Request(Request),
    Notification(Notification),
    Response(Response),
    Error(ErrorResponse),
}

impl Message {
    pub fn is_request(&self) -> bool {
        matches!(self, Message::Request(_))
    }

    pub fn is_notification(&self) -> bool {
        matches!(self, Message::Notification(_))
    }

    /// Whether this is a reply (success or error)
    pub fn is_reply(&self) -> bool {
        matches!(self, Message::Response(_) | Message::Error(_))
    }

    /// Id of the message, `None` for notifications
    pub fn id(&self) -> Option<&Id> {
        match self {
            Message::Request(r) => Some(&r.id),
            Message::Notification(_) => None,
            Message::Response(r) => Some(&r.id),
            Message::Error(r) => Some(&r.id),
        }
    }

    /// Method name for requests and notifications
    pub fn method(&self) -> Option<&str> {
        match self {
            Message::Request(r) => Some(&r.method),
            Message::Notification(n) => Some(&n.method),
            Message::Response(_) | Message::Error(_) => None,
        }
    }
}

impl From<Request> for Message {
    fn from(r: Request) -> Self {
        Message::Request(r)
    }
}

impl From<Notification> for Message {
    fn from(n: Notification) -> Self {
        Message::Notification(n)
    }
}

impl From<Response> for Message {
    fn from(r: Response) -> Self {
        Message::Response(r)
    }
}

impl From<ErrorResponse> for Message {
    fn from(r: ErrorResponse) -> Self {
        Message::Error(r)
    }
}
