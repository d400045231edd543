//! Dispatcher integration tests

use jrpc_core::{Error, ErrorObject, Params};
use jrpc_server::{from_fn, from_typed_fn, BatchMode, BatchProcessor, Dispatcher, MethodRegistry, ParamConvention};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Deserialize)]
struct SumParams {
    values: Vec<i64>,
}

async fn dispatcher(mode: BatchMode) -> Dispatcher {
    let registry = MethodRegistry::new();

    registry
        .register(
            "sum",
            from_typed_fn(|p: SumParams| async move { Ok(p.values.iter().sum::<i64>()) }),
            ParamConvention::Named,
        )
        .await
        .unwrap();

    registry
        .register(
            "echo",
            from_fn(|p: Option<Params>| async move {
                Ok(p.and_then(|p| p.get_index(0).cloned()).unwrap_or_default())
            }),
            ParamConvention::Positional,
        )
        .await
        .unwrap();

    registry
        .register(
            "withdraw",
            from_fn(|_| async move {
                Err(Error::Rpc(
                    ErrorObject::new(1001, "Insufficient funds").with_data(json!({"balance": 3})),
                ))
            }),
            ParamConvention::Either,
        )
        .await
        .unwrap();

    registry
        .register(
            "fail",
            from_fn(|_| async move { Err(Error::Internal("disk full".into())) }),
            ParamConvention::Either,
        )
        .await
        .unwrap();

    Dispatcher::new(registry).with_batch_processor(BatchProcessor::new(mode))
}

#[tokio::test]
async fn test_named_params_call() {
    let d = dispatcher(BatchMode::Parallel).await;
    let reply = d
        .dispatch(json!({"jsonrpc": "2.0", "method": "sum", "params": {"values": [1, 2, 3]}, "id": "abc"}))
        .await;
    assert_eq!(reply, Some(json!({"jsonrpc": "2.0", "result": 6, "id": "abc"})));
}

#[tokio::test]
async fn test_unknown_method_keeps_every_id_shape() {
    let d = dispatcher(BatchMode::Parallel).await;
    for id in [json!(7), json!("seven"), Value::Null] {
        let reply = d
            .dispatch(json!({"jsonrpc": "2.0", "method": "ghost", "id": id.clone()}))
            .await
            .unwrap();
        assert_eq!(reply["error"]["code"], json!(-32601));
        assert_eq!(reply["id"], id);
    }
}

#[tokio::test]
async fn test_application_error_passes_through() {
    let d = dispatcher(BatchMode::Parallel).await;
    let reply = d
        .dispatch(json!({"jsonrpc": "2.0", "method": "withdraw", "id": 1}))
        .await
        .unwrap();
    assert_eq!(
        reply,
        json!({
            "jsonrpc": "2.0",
            "error": {"code": 1001, "message": "Insufficient funds", "data": {"balance": 3}},
            "id": 1
        })
    );
}

#[tokio::test]
async fn test_internal_error_carries_diagnostic() {
    let d = dispatcher(BatchMode::Parallel).await;
    let reply = d
        .dispatch(json!({"jsonrpc": "2.0", "method": "fail", "id": 1}))
        .await
        .unwrap();
    assert_eq!(reply["error"]["code"], json!(-32603));
    assert_eq!(reply["error"]["message"], json!("Internal error"));
    assert!(reply["error"]["data"].as_str().unwrap().contains("disk full"));
}

#[tokio::test]
async fn test_notifications_never_reply() {
    let d = dispatcher(BatchMode::Parallel).await;
    for method in ["echo", "withdraw", "fail", "ghost"] {
        let reply = d.dispatch(json!({"jsonrpc": "2.0", "method": method})).await;
        assert_eq!(reply, None, "{method}");
    }
}

#[tokio::test]
async fn test_malformed_top_level() {
    let d = dispatcher(BatchMode::Parallel).await;
    for bad in [json!(42), json!("text"), json!(true), Value::Null] {
        let reply = d.dispatch(bad).await.unwrap();
        assert_eq!(reply["error"]["code"], json!(-32700));
        assert_eq!(reply["id"], Value::Null);
    }

    let reply = d.dispatch_text("not json").await.unwrap();
    assert_eq!(reply["error"]["code"], json!(-32700));
}

#[tokio::test]
async fn test_invalid_request_shapes() {
    let d = dispatcher(BatchMode::Parallel).await;
    let cases = [
        (json!({"method": "echo", "id": 1}), json!(1)),
        (json!({"jsonrpc": "1.0", "method": "echo", "id": 2}), json!(2)),
        (json!({"jsonrpc": "2.0", "method": 5, "id": 3}), json!(3)),
        (json!({"jsonrpc": "2.0", "method": "echo", "params": 5, "id": 4}), json!(4)),
        (json!({"jsonrpc": "2.0", "method": "echo", "id": {"x": 1}}), Value::Null),
        (json!({"jsonrpc": "2.0", "method": "echo", "id": 1.5}), Value::Null),
        (json!({"jsonrpc": "2.0", "method": "echo", "id": u64::MAX}), Value::Null),
    ];
    for (request, id) in cases {
        let reply = d.dispatch(request.clone()).await.unwrap();
        assert_eq!(reply["error"]["code"], json!(-32600), "{request}");
        assert_eq!(reply["id"], id, "{request}");
    }
}

#[tokio::test]
async fn test_batch_reply_counts() {
    for mode in [BatchMode::Parallel, BatchMode::Sequential] {
        let d = dispatcher(mode).await;
        for requests in 0..4 {
            for notifications in 0..4 {
                if requests + notifications == 0 {
                    continue;
                }
                let mut batch = Vec::new();
                for n in 0..requests {
                    batch.push(json!({"jsonrpc": "2.0", "method": "echo", "params": [n], "id": n}));
                }
                for _ in 0..notifications {
                    batch.push(json!({"jsonrpc": "2.0", "method": "fail"}));
                }

                let reply = d.dispatch(Value::Array(batch)).await;
                if requests == 0 {
                    assert_eq!(reply, None);
                } else {
                    let replies = reply.unwrap();
                    assert_eq!(replies.as_array().unwrap().len(), requests as usize);
                }
            }
        }
    }
}

#[tokio::test]
async fn test_concurrent_dispatch_with_registration() {
    let d = dispatcher(BatchMode::Parallel).await;

    let mut tasks = Vec::new();
    for n in 0..32 {
        let d = d.clone();
        tasks.push(tokio::spawn(async move {
            d.dispatch(json!({"jsonrpc": "2.0", "method": "echo", "params": [n], "id": n}))
                .await
        }));
    }
    for n in 0..8 {
        d.registry()
            .register(format!("extra{n}"), from_fn(|_| async move { Ok(Value::Null) }), ParamConvention::Either)
            .await
            .unwrap();
    }

    for (n, task) in tasks.into_iter().enumerate() {
        let reply = task.await.unwrap().unwrap();
        assert_eq!(reply["result"], json!(n));
    }
    assert_eq!(d.registry().len().await, 12);
}
