//! Conversion between JSON values and JSON-RPC messages
//!
//! The engine works on already-parsed [`serde_json::Value`]s. This module
//! validates a value against the JSON-RPC 2.0 rules and produces a typed
//! [`Message`], or turns a message back into a value.
//!
//! # Validation rules
//!
//! - `jsonrpc` must be present and equal to `"2.0"`
//! - `method`, when present, must be a string
//! - `id` must be a string, an integer or null
//! - `params`, when present, must be an array or an object (`null` reads as absent)
//! - a reply carries exactly one of `result` and `error`
//! - an error object has an integer `code` and a string `message`
//!
//! A failure records the id if it was readable, so the Invalid Request reply
//! can still be correlated by the peer.
//!
//! # Example
//!
//! ```rust
//! use jrpc_core::codec::{self, Incoming};
//! use jrpc_core::Message;
//! use serde_json::json;
//!
//! let value = json!({"jsonrpc": "2.0", "method": "echo", "params": [42], "id": 1});
//! let Incoming::Single(Message::Request(request)) = codec::decode(value.clone()).unwrap() else {
//!     panic!("expected a request");
//! };
//! assert_eq!(request.method, "echo");
//! assert_eq!(codec::encode(&Message::Request(request)), value);
//! ```

use crate::error::{DecodeError, ErrorObject, Result};
use crate::types::{
    ErrorResponse, Id, Message, Notification, Params, Request, Response, JSONRPC_VERSION,
};
use serde_json::{Map, Value};

/// A decoded top-level value
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    /// One message
    Single(Message),
    /// A non-empty array whose elements still need decoding one by one
    Batch(Vec<Value>),
}

/// Parse raw JSON text into a value
///
/// Text that is not valid JSON is a Parse error.
pub fn parse(text: &str) -> std::result::Result<Value, DecodeError> {
    serde_json::from_str(text).map_err(|e| DecodeError::parse(e.to_string()))
}

/// Decode a top-level value
///
/// Arrays are handed back as batches for per-element processing. An empty
/// array is an Invalid Request. A value that is neither an object nor an
/// array cannot hold a message and is reported as a Parse error.
pub fn decode(value: Value) -> std::result::Result<Incoming, DecodeError> {
    match value {
        Value::Array(items) if items.is_empty() => {
            Err(DecodeError::invalid_request("empty batch", None))
        }
        Value::Array(items) => Ok(Incoming::Batch(items)),
        object @ Value::Object(_) => decode_message(object).map(Incoming::Single),
        other => Err(DecodeError::parse(format!(
            "top-level value must be an object or array, got {}",
            kind_of(&other)
        ))),
    }
}

/// Decode a single message
///
/// Used for batch elements too, where a non-object element is an Invalid
/// Request rather than a Parse error.
pub fn decode_message(value: Value) -> std::result::Result<Message, DecodeError> {
    let Value::Object(mut obj) = value else {
        return Err(DecodeError::invalid_request(
            format!("message must be an object, got {}", kind_of(&value)),
            None,
        ));
    };

    // Read the id first so every later failure can report it.
    let id = match obj.remove("id") {
        None => None,
        Some(raw) => match Id::from_value(&raw) {
            Some(id) => Some(id),
            None => {
                return Err(DecodeError::invalid_request(
                    format!("id must be a string, an integer or null, got {}", kind_of(&raw)),
                    None,
                ))
            }
        },
    };
    let fail = |reason: String| DecodeError::invalid_request(reason, id.clone());

    match obj.get("jsonrpc") {
        Some(Value::String(v)) if v == JSONRPC_VERSION => {}
        Some(other) => return Err(fail(format!("unsupported jsonrpc version {}", other))),
        None => return Err(fail("missing jsonrpc version".to_string())),
    }

    let has_result = obj.contains_key("result");
    let has_error = obj.contains_key("error");

    if let Some(method) = obj.remove("method") {
        let Value::String(method) = method else {
            return Err(fail("method must be a string".to_string()));
        };
        if has_result || has_error {
            return Err(fail("a call cannot carry result or error".to_string()));
        }
        let params = match obj.remove("params") {
            None | Some(Value::Null) => None,
            Some(raw) => match Params::from_value(raw) {
                Ok(params) => Some(params),
                Err(scalar) => {
                    return Err(fail(format!(
                        "params must be an array or object, got {}",
                        kind_of(&scalar)
                    )))
                }
            },
        };
        return Ok(match id {
            Some(id) => Message::Request(Request { method, params, id }),
            None => Message::Notification(Notification { method, params }),
        });
    }

    match (has_result, has_error) {
        (true, true) => Err(fail("reply carries both result and error".to_string())),
        (false, false) => Err(fail("missing method, result or error".to_string())),
        (true, false) => {
            let Some(id) = id else {
                return Err(fail("response missing id".to_string()));
            };
            let result = obj.remove("result").unwrap_or(Value::Null);
            Ok(Message::Response(Response { id, result }))
        }
        (false, true) => {
            let error = match obj.remove("error") {
                Some(raw) => decode_error_object(raw).map_err(fail)?,
                None => return Err(fail("missing error".to_string())),
            };
            let Some(id) = id else {
                return Err(fail("error response missing id".to_string()));
            };
            Ok(Message::Error(ErrorResponse { id, error }))
        }
    }
}

fn decode_error_object(raw: Value) -> std::result::Result<ErrorObject, String> {
    let Value::Object(mut obj) = raw else {
        return Err("error must be an object".to_string());
    };
    let code = obj
        .get("code")
        .and_then(Value::as_i64)
        .and_then(|c| i32::try_from(c).ok())
        .ok_or_else(|| "error code must be an integer".to_string())?;
    let message = match obj.remove("message") {
        Some(Value::String(message)) => message,
        _ => return Err("error message must be a string".to_string()),
    };
    Ok(ErrorObject {
        code,
        message,
        data: obj.remove("data"),
    })
}

/// Encode a message as a JSON value
pub fn encode(message: &Message) -> Value {
    let mut obj = Map::new();
    obj.insert("jsonrpc".into(), Value::String(JSONRPC_VERSION.into()));
    match message {
        Message::Request(request) => {
            obj.insert("method".into(), Value::String(request.method.clone()));
            if let Some(params) = &request.params {
                obj.insert("params".into(), params.to_value());
            }
            obj.insert("id".into(), request.id.to_value());
        }
        Message::Notification(note) => {
            obj.insert("method".into(), Value::String(note.method.clone()));
            if let Some(params) = &note.params {
                obj.insert("params".into(), params.to_value());
            }
        }
        Message::Response(response) => {
            obj.insert("result".into(), response.result.clone());
            obj.insert("id".into(), response.id.to_value());
        }
        Message::Error(reply) => {
            obj.insert("error".into(), encode_error_object(&reply.error));
            obj.insert("id".into(), reply.id.to_value());
        }
    }
    Value::Object(obj)
}

fn encode_error_object(error: &ErrorObject) -> Value {
    let mut obj = Map::new();
    obj.insert("code".into(), Value::from(error.code));
    obj.insert("message".into(), Value::String(error.message.clone()));
    if let Some(data) = &error.data {
        obj.insert("data".into(), data.clone());
    }
    Value::Object(obj)
}

/// Encode several messages as one batch array
pub fn encode_batch(messages: &[Message]) -> Value {
    Value::Array(messages.iter().map(encode).collect())
}

/// Encode a message straight to JSON text
pub fn to_string(message: &Message) -> Result<String> {
    Ok(serde_json::to_string(&encode(message))?)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeErrorKind;
    use serde_json::json;

    fn single(value: Value) -> Message {
        match decode(value) {
            Ok(Incoming::Single(message)) => message,
            other => panic!("expected a single message, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_request() {
        let msg = single(json!({"jsonrpc": "2.0", "method": "add", "params": [1, 2], "id": 1}));
        assert_eq!(
            msg,
            Message::Request(Request::new(
                "add",
                Some(Params::Positional(vec![json!(1), json!(2)])),
                Id::Number(1)
            ))
        );
    }

    #[test]
    fn test_decode_notification() {
        let msg = single(json!({"jsonrpc": "2.0", "method": "tick"}));
        assert_eq!(msg, Message::Notification(Notification::new("tick", None)));
    }

    #[test]
    fn test_null_id_is_still_a_request() {
        let msg = single(json!({"jsonrpc": "2.0", "method": "m", "id": null}));
        assert!(matches!(msg, Message::Request(Request { id: Id::Null, .. })));
    }

    #[test]
    fn test_null_params_read_as_absent() {
        let msg = single(json!({"jsonrpc": "2.0", "method": "m", "params": null, "id": "a"}));
        assert!(matches!(msg, Message::Request(Request { params: None, .. })));
    }

    #[test]
    fn test_decode_replies() {
        let ok = single(json!({"jsonrpc": "2.0", "result": null, "id": 9}));
        assert_eq!(ok, Message::Response(Response::new(Id::Number(9), Value::Null)));

        let err = single(json!({
            "jsonrpc": "2.0",
            "error": {"code": -32601, "message": "Method not found", "data": null},
            "id": "x"
        }));
        let Message::Error(reply) = err else {
            panic!("expected error response");
        };
        assert_eq!(reply.id, Id::from("x"));
        assert_eq!(reply.error.code, -32601);
        assert_eq!(reply.error.data, Some(Value::Null));
    }

    #[test]
    fn test_round_trip() {
        let messages = vec![
            Message::Request(Request::new("a", None, Id::Null)),
            Message::Request(Request::new(
                "b",
                Some(Params::from_value(json!({"k": [1, {"z": null}]})).unwrap()),
                Id::from("req-1"),
            )),
            Message::Request(Request::new("c", Some(Params::Positional(vec![])), Id::Number(-5))),
            Message::Notification(Notification::new("d", Some(Params::Positional(vec![json!("x")])))),
            Message::Response(Response::new(Id::Number(i64::MAX), json!({"nested": [true]}))),
            Message::Response(Response::new(Id::Null, Value::Null)),
            Message::Error(ErrorResponse::new(
                Id::from(""),
                ErrorObject::new(12, "custom").with_data(Value::Null),
            )),
            Message::Error(ErrorResponse::new(Id::Null, ErrorObject::parse_error())),
        ];

        for message in messages {
            assert_eq!(single(encode(&message)), message);
        }
    }

    #[test]
    fn test_encode_omits_absent_members() {
        let encoded = encode(&Message::Notification(Notification::new("n", None)));
        assert_eq!(encoded, json!({"jsonrpc": "2.0", "method": "n"}));
    }

    #[test]
    fn test_bare_scalar_is_parse_error() {
        for value in [json!(42), json!("text"), json!(true), Value::Null] {
            let err = decode(value).unwrap_err();
            assert_eq!(err.kind, DecodeErrorKind::Parse);
            assert_eq!(err.reply_id(), Id::Null);
        }
    }

    #[test]
    fn test_empty_batch_is_invalid_request() {
        let err = decode(json!([])).unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::InvalidRequest);
    }

    #[test]
    fn test_batch_is_not_decoded_eagerly() {
        let Incoming::Batch(items) = decode(json!([1, {"jsonrpc": "2.0", "method": "m"}])).unwrap() else {
            panic!("expected batch");
        };
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_batch_element_scalar_is_invalid_request() {
        let err = decode_message(json!(1)).unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::InvalidRequest);
        assert_eq!(err.id, None);
    }

    #[test]
    fn test_invalid_messages_keep_best_effort_id() {
        let cases = [
            json!({"jsonrpc": "1.0", "method": "m", "id": 1}),
            json!({"method": "m", "id": 1}),
            json!({"jsonrpc": "2.0", "method": 5, "id": 1}),
            json!({"jsonrpc": "2.0", "method": "m", "params": 3, "id": 1}),
            json!({"jsonrpc": "2.0", "result": 1, "error": {"code": 1, "message": "m"}, "id": 1}),
            json!({"jsonrpc": "2.0", "id": 1}),
            json!({"jsonrpc": "2.0", "error": {"code": "x", "message": "m"}, "id": 1}),
            json!({"jsonrpc": "2.0", "error": {"code": 1}, "id": 1}),
            json!({"jsonrpc": "2.0", "method": "m", "result": 1, "id": 1}),
        ];
        for case in cases {
            let err = decode_message(case.clone()).unwrap_err();
            assert_eq!(err.kind, DecodeErrorKind::InvalidRequest, "{}", case);
            assert_eq!(err.id, Some(Id::Number(1)), "{}", case);
        }
    }

    #[test]
    fn test_wrong_id_type_loses_id() {
        for id in [json!(1.5), json!(true), json!({"a": 1}), json!([1])] {
            let err = decode_message(json!({"jsonrpc": "2.0", "method": "m", "id": id})).unwrap_err();
            assert_eq!(err.kind, DecodeErrorKind::InvalidRequest);
            assert_eq!(err.reply_id(), Id::Null);
        }
    }

    #[test]
    fn test_reply_without_id_is_invalid() {
        let err = decode_message(json!({"jsonrpc": "2.0", "result": 1})).unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::InvalidRequest);
    }

    #[test]
    fn test_parse_text() {
        assert_eq!(parse("{\"a\":1}").unwrap(), json!({"a": 1}));
        assert_eq!(parse("{oops").unwrap_err().kind, DecodeErrorKind::Parse);
    }

    #[test]
    fn test_encode_batch_and_text() {
        let messages = vec![
            Message::Response(Response::new(Id::Number(1), json!(1))),
            Message::Error(ErrorResponse::new(Id::Number(2), ErrorObject::method_not_found("x"))),
        ];
        let batch = encode_batch(&messages);
        assert_eq!(batch.as_array().map(Vec::len), Some(2));

        let text = to_string(&messages[0]).unwrap();
        assert_eq!(parse(&text).unwrap(), encode(&messages[0]));
    }
}
