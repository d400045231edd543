//! Inbound message dispatch
//!
//! The dispatcher takes every top-level value a transport delivers and
//! decides what, if anything, goes back:
//!
//! | Inbound                         | Outcome                                      |
//! |---------------------------------|----------------------------------------------|
//! | Request, method registered      | handler runs, `result` or `error` reply      |
//! | Request, method unknown         | `-32601` reply with the request's id         |
//! | Notification                    | handler runs if registered, never a reply    |
//! | Response / error response       | handed to the reply router, never a reply    |
//! | Object breaking protocol rules  | `-32600` reply, best-effort id               |
//! | Scalar at top level             | `-32700` reply, id null                      |
//! | Batch                           | see [`crate::batch`]                         |
//!
//! Handler failures never escape this boundary: returned errors are mapped
//! with [`Error::to_error_object`] and panics are caught and reported as
//! `-32603`.

use crate::batch::BatchProcessor;
use crate::registry::{MethodRegistry, RegisteredMethod};
use futures::FutureExt;
use jrpc_core::{
    codec, DecodeError, DecodeErrorKind, EngineMetrics, Error, ErrorObject, ErrorResponse, Id,
    Incoming, Message, Notification, ReplyRouter, Request, Response,
};
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

/// Routes inbound messages to handlers and replies to the call tracker
#[derive(Clone)]
pub struct Dispatcher {
    registry: MethodRegistry,
    batch: BatchProcessor,
    replies: Option<Arc<dyn ReplyRouter>>,
    metrics: Option<Arc<EngineMetrics>>,
}

impl Dispatcher {
    pub fn new(registry: MethodRegistry) -> Self {
        Self {
            registry,
            batch: BatchProcessor::default(),
            replies: None,
            metrics: None,
        }
    }

    pub fn with_batch_processor(mut self, batch: BatchProcessor) -> Self {
        self.batch = batch;
        self
    }

    /// Where inbound responses go
    ///
    /// Without a router every inbound response is dropped.
    pub fn with_reply_router(mut self, router: Arc<dyn ReplyRouter>) -> Self {
        self.replies = Some(router);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<EngineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn registry(&self) -> &MethodRegistry {
        &self.registry
    }

    pub fn batch_processor(&self) -> &BatchProcessor {
        &self.batch
    }

    pub(crate) fn metrics(&self) -> Option<&EngineMetrics> {
        self.metrics.as_deref()
    }

    /// Dispatch one top-level value and return the reply to send, if any
    #[tracing::instrument(skip_all)]
    pub async fn dispatch(&self, value: Value) -> Option<Value> {
        match codec::decode(value) {
            Ok(Incoming::Single(message)) => self
                .dispatch_message(message)
                .await
                .map(|reply| codec::encode(&reply)),
            Ok(Incoming::Batch(items)) => {
                let replies = self.batch.process(items, self).await;
                if replies.is_empty() {
                    None
                } else {
                    Some(codec::encode_batch(&replies))
                }
            }
            Err(e) => Some(codec::encode(&self.reject(e))),
        }
    }

    /// Dispatch raw JSON text
    ///
    /// Text that does not parse gets a `-32700` reply.
    pub async fn dispatch_text(&self, text: &str) -> Option<Value> {
        match codec::parse(text) {
            Ok(value) => self.dispatch(value).await,
            Err(e) => Some(codec::encode(&self.reject(e))),
        }
    }

    /// Dispatch one decoded message
    pub async fn dispatch_message(&self, message: Message) -> Option<Message> {
        match message {
            Message::Request(request) => Some(self.handle_request(request).await),
            Message::Notification(note) => {
                self.handle_notification(note).await;
                None
            }
            Message::Response(Response { id, result }) => {
                self.route_reply(id, Ok(result)).await;
                None
            }
            Message::Error(ErrorResponse { id, error }) => {
                self.route_reply(id, Err(error)).await;
                None
            }
        }
    }

    /// Turn a decode failure into the reply the peer must see
    pub(crate) fn reject(&self, error: DecodeError) -> Message {
        tracing::warn!(reason = %error.reason, kind = %error.kind, "rejecting inbound value");
        if let Some(metrics) = self.metrics() {
            metrics.record_protocol_error(match error.kind {
                DecodeErrorKind::Parse => "parse",
                DecodeErrorKind::InvalidRequest => "invalid_request",
            });
        }
        Message::Error(ErrorResponse::new(error.reply_id(), error.to_error_object()))
    }

    async fn handle_request(&self, request: Request) -> Message {
        let Request { method, params, id } = request;

        let Some(entry) = self.registry.lookup(&method).await else {
            tracing::debug!(method = %method, id = %id, "method not found");
            if let Some(metrics) = self.metrics() {
                metrics.record_dispatch(&method, "request", "not_found", 0.0);
            }
            return Message::Error(ErrorResponse::new(id, ErrorObject::method_not_found(&method)));
        };

        let started = Instant::now();
        let outcome = run_handler(&entry, params).await;
        let status = if outcome.is_ok() { "success" } else { "error" };
        if let Some(metrics) = self.metrics() {
            metrics.record_dispatch(&method, "request", status, started.elapsed().as_secs_f64());
        }

        match outcome {
            Ok(result) => Message::Response(Response::new(id, result)),
            Err(error) => {
                tracing::debug!(method = %method, id = %id, code = error.code, "request failed");
                Message::Error(ErrorResponse::new(id, error))
            }
        }
    }

    async fn handle_notification(&self, note: Notification) {
        let Notification { method, params } = note;

        let Some(entry) = self.registry.lookup(&method).await else {
            tracing::debug!(method = %method, "notification for unknown method ignored");
            return;
        };

        let started = Instant::now();
        let outcome = run_handler(&entry, params).await;
        if let Some(metrics) = self.metrics() {
            let status = if outcome.is_ok() { "success" } else { "error" };
            metrics.record_dispatch(&method, "notification", status, started.elapsed().as_secs_f64());
        }
        if let Err(error) = outcome {
            tracing::warn!(method = %method, error = %error, "notification handler failed");
        }
    }

    async fn route_reply(&self, id: Id, outcome: Result<Value, ErrorObject>) {
        let Some(router) = &self.replies else {
            tracing::debug!(id = %id, "no reply router, dropping reply");
            return;
        };
        if !router.route_reply(id.clone(), outcome).await {
            tracing::debug!(id = %id, "no pending call for reply, dropped");
        }
    }
}

/// Run a handler, catching panics
async fn run_handler(
    entry: &RegisteredMethod,
    params: Option<jrpc_core::Params>,
) -> Result<Value, ErrorObject> {
    match AssertUnwindSafe(entry.invoke(params)).catch_unwind().await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(error.to_error_object()),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!(method = %entry.name(), panic = %message, "handler panicked");
            Err(Error::Internal(format!("handler panicked: {}", message)).to_error_object())
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::from_fn;
    use crate::registry::ParamConvention;
    use async_trait::async_trait;
    use jrpc_core::Params;
    use serde_json::json;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingRouter {
        seen: Mutex<Vec<(Id, Result<Value, ErrorObject>)>>,
    }

    #[async_trait]
    impl ReplyRouter for RecordingRouter {
        async fn route_reply(&self, id: Id, outcome: Result<Value, ErrorObject>) -> bool {
            self.seen.lock().await.push((id, outcome));
            true
        }
    }

    async fn explode(_: Option<Params>) -> jrpc_core::Result<Value> {
        panic!("handler exploded")
    }

    async fn dispatcher() -> Dispatcher {
        let registry = MethodRegistry::new();
        registry
            .register(
                "echo",
                from_fn(|p: Option<Params>| async move {
                    Ok(p.and_then(|p| p.get_index(0).cloned()).unwrap_or(Value::Null))
                }),
                ParamConvention::Positional,
            )
            .await
            .unwrap();
        registry
            .register(
                "fail",
                from_fn(|_| async { Err(Error::Internal("boom".into())) }),
                ParamConvention::Either,
            )
            .await
            .unwrap();
        registry
            .register(
                "app_error",
                from_fn(|_| async {
                    Err(Error::Rpc(ErrorObject::new(4001, "insufficient funds").with_data(json!({"balance": 3}))))
                }),
                ParamConvention::Either,
            )
            .await
            .unwrap();
        registry
            .register(
                "panic",
                from_fn(explode),
                ParamConvention::Either,
            )
            .await
            .unwrap();
        Dispatcher::new(registry)
    }

    #[tokio::test]
    async fn test_request_success() {
        let d = dispatcher().await;
        let reply = d
            .dispatch(json!({"jsonrpc": "2.0", "method": "echo", "params": [42], "id": 1}))
            .await;
        assert_eq!(reply, Some(json!({"jsonrpc": "2.0", "result": 42, "id": 1})));
    }

    #[tokio::test]
    async fn test_unknown_method_keeps_id() {
        let d = dispatcher().await;
        for id in [json!(7), json!("abc"), Value::Null] {
            let reply = d
                .dispatch(json!({"jsonrpc": "2.0", "method": "ghost", "id": id.clone()}))
                .await
                .unwrap();
            assert_eq!(reply["error"]["code"], json!(-32601));
            assert_eq!(reply["id"], id);
            assert!(reply.get("result").is_none());
        }
    }

    #[tokio::test]
    async fn test_handler_error_becomes_internal_error() {
        let d = dispatcher().await;
        let reply = d
            .dispatch(json!({"jsonrpc": "2.0", "method": "fail", "id": 2}))
            .await
            .unwrap();
        assert_eq!(reply["error"]["code"], json!(-32603));
        assert_eq!(reply["error"]["message"], json!("Internal error"));
        assert_eq!(reply["id"], json!(2));
    }

    #[tokio::test]
    async fn test_application_error_passes_through() {
        let d = dispatcher().await;
        let reply = d
            .dispatch(json!({"jsonrpc": "2.0", "method": "app_error", "id": 3}))
            .await
            .unwrap();
        assert_eq!(
            reply["error"],
            json!({"code": 4001, "message": "insufficient funds", "data": {"balance": 3}})
        );
    }

    #[tokio::test]
    async fn test_panic_is_caught() {
        let d = dispatcher().await;
        let reply = d
            .dispatch(json!({"jsonrpc": "2.0", "method": "panic", "id": 4}))
            .await
            .unwrap();
        assert_eq!(reply["error"]["code"], json!(-32603));
        assert!(reply["error"]["data"]
            .as_str()
            .unwrap()
            .contains("handler exploded"));

        // The dispatcher keeps working afterwards
        let next = d
            .dispatch(json!({"jsonrpc": "2.0", "method": "echo", "params": [1], "id": 5}))
            .await;
        assert_eq!(next.unwrap()["result"], json!(1));
    }

    #[tokio::test]
    async fn test_wrong_param_shape_is_invalid_params() {
        let d = dispatcher().await;
        let reply = d
            .dispatch(json!({"jsonrpc": "2.0", "method": "echo", "params": {"a": 1}, "id": 6}))
            .await
            .unwrap();
        assert_eq!(reply["error"]["code"], json!(-32602));
    }

    #[tokio::test]
    async fn test_notifications_never_reply() {
        let d = dispatcher().await;
        for method in ["echo", "fail", "panic", "app_error", "ghost"] {
            let reply = d.dispatch(json!({"jsonrpc": "2.0", "method": method, "params": [1]})).await;
            assert_eq!(reply, None, "{}", method);
        }
    }

    #[tokio::test]
    async fn test_bare_scalar_is_parse_error() {
        let d = dispatcher().await;
        let reply = d.dispatch(json!(42)).await.unwrap();
        assert_eq!(reply["error"]["code"], json!(-32700));
        assert_eq!(reply["id"], Value::Null);
    }

    #[tokio::test]
    async fn test_invalid_request_uses_best_effort_id() {
        let d = dispatcher().await;
        let reply = d.dispatch(json!({"jsonrpc": "2.0", "id": 9})).await.unwrap();
        assert_eq!(reply["error"]["code"], json!(-32600));
        assert_eq!(reply["id"], json!(9));

        let reply = d
            .dispatch(json!({"jsonrpc": "2.0", "method": "echo", "id": [1]}))
            .await
            .unwrap();
        assert_eq!(reply["error"]["code"], json!(-32600));
        assert_eq!(reply["id"], Value::Null);
    }

    #[tokio::test]
    async fn test_empty_batch_is_invalid_request() {
        let d = dispatcher().await;
        let reply = d.dispatch(json!([])).await.unwrap();
        assert_eq!(reply["error"]["code"], json!(-32600));
        assert_eq!(reply["id"], Value::Null);
    }

    #[tokio::test]
    async fn test_dispatch_text() {
        let d = dispatcher().await;
        let reply = d.dispatch_text("{\"jsonrpc\": \"2.0\", \"method\"").await.unwrap();
        assert_eq!(reply["error"]["code"], json!(-32700));

        let reply = d
            .dispatch_text(r#"{"jsonrpc":"2.0","method":"echo","params":["hi"],"id":"t"}"#)
            .await
            .unwrap();
        assert_eq!(reply["result"], json!("hi"));
    }

    #[tokio::test]
    async fn test_replies_go_to_router() {
        let router = Arc::new(RecordingRouter::default());
        let d = dispatcher().await.with_reply_router(router.clone());

        assert_eq!(d.dispatch(json!({"jsonrpc": "2.0", "result": 1, "id": 1})).await, None);
        assert_eq!(
            d.dispatch(json!({"jsonrpc": "2.0", "error": {"code": -1, "message": "x"}, "id": 2}))
                .await,
            None
        );

        let seen = router.seen.lock().await;
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], (Id::Number(1), Ok(json!(1))));
        assert_eq!(seen[1].0, Id::Number(2));
        assert_eq!(seen[1].1.as_ref().unwrap_err().code, -1);
    }

    #[tokio::test]
    async fn test_replies_without_router_are_dropped() {
        let d = dispatcher().await;
        assert_eq!(d.dispatch(json!({"jsonrpc": "2.0", "result": 1, "id": 1})).await, None);
    }

    #[tokio::test]
    async fn test_unregistered_method_stops_resolving() {
        let d = dispatcher().await;
        assert!(d.registry().unregister("echo").await);
        let reply = d
            .dispatch(json!({"jsonrpc": "2.0", "method": "echo", "params": [1], "id": 1}))
            .await
            .unwrap();
        assert_eq!(reply["error"]["code"], json!(-32601));
    }

    #[tokio::test]
    async fn test_metrics_do_not_change_replies() {
        let d = dispatcher().await.with_metrics(Arc::new(EngineMetrics::new()));
        let reply = d
            .dispatch(json!({"jsonrpc": "2.0", "method": "echo", "params": [8], "id": 1}))
            .await;
        assert_eq!(reply.unwrap()["result"], json!(8));
        assert!(d.dispatch(json!(null)).await.is_some());
    }
}
