//! Method handlers
//!
//! A handler is one capability: take the request's params, return a result
//! or an error. The [`Handler`] trait is object safe so handlers of any
//! concrete type can sit side by side in the registry.
//!
//! # Creating handlers
//!
//! 1. [`from_fn`]: async closure over raw [`Params`]
//! 2. [`from_typed_fn`]: async closure over a `Deserialize` type, result is serialized
//! 3. `#[handler]` from jrpc-macros, which expands to `from_typed_fn`
//!
//! # Errors
//!
//! Whatever a handler returns is turned into the wire error by
//! [`Error::to_error_object`]. Return `Error::Rpc(ErrorObject::new(code, ..))`
//! to choose the code yourself.
//!
//! ```rust
//! use jrpc_server::{from_fn, from_typed_fn};
//! use jrpc_core::{Error, ErrorObject};
//! use serde::Deserialize;
//!
//! let echo = from_fn(|params| async move {
//!     Ok(params.map(|p| p.into_value()).unwrap_or_default())
//! });
//!
//! #[derive(Deserialize)]
//! struct Transfer { amount: u64 }
//!
//! let transfer = from_typed_fn(|t: Transfer| async move {
//!     if t.amount > 100 {
//!         return Err(Error::Rpc(ErrorObject::new(4001, "insufficient funds")));
//!     }
//!     Ok(t.amount)
//! });
//! ```

use jrpc_core::{Error, Params, Result};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future returned by every handler
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value>> + Send>>;

/// An invocable method implementation
pub trait Handler: Send + Sync {
    /// Run the method
    ///
    /// `params` is `None` when the call carried no params member.
    fn handle(&self, params: Option<Params>) -> HandlerFuture;
}

/// Adapter from an async closure to [`Handler`]
pub struct FnHandler<F> {
    func: F,
}

impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Option<Params>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    fn handle(&self, params: Option<Params>) -> HandlerFuture {
        Box::pin((self.func)(params))
    }
}

/// Handler over raw params
pub fn from_fn<F, Fut>(func: F) -> Box<dyn Handler>
where
    F: Fn(Option<Params>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    Box::new(FnHandler { func })
}

/// Handler over typed params
///
/// Params are deserialized into `P`; absent params deserialize from `null`,
/// which suits `()` and `Option<T>`. A struct reads named params, a tuple or
/// `Vec` reads positional ones. Failure to deserialize is `InvalidParams`,
/// failure to serialize the result is `Serialization`.
pub fn from_typed_fn<P, R, F, Fut>(func: F) -> Box<dyn Handler>
where
    P: serde::de::DeserializeOwned + Send + 'static,
    R: serde::Serialize + Send + 'static,
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
{
    let func = Arc::new(func);

    from_fn(move |params: Option<Params>| {
        let func = Arc::clone(&func);
        async move {
            let raw = params.map(Params::into_value).unwrap_or(Value::Null);
            let typed: P =
                serde_json::from_value(raw).map_err(|e| Error::InvalidParams(e.to_string()))?;
            let result = func(typed).await?;
            serde_json::to_value(result).map_err(|e| Error::Serialization(e.to_string()))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use jrpc_core::ErrorObject;
    use serde::Deserialize;
    use serde_json::json;

    #[tokio::test]
    async fn test_from_fn_sees_raw_params() {
        let handler = from_fn(|params| async move {
            Ok(json!({"positional": params.as_ref().map(Params::is_positional)}))
        });

        let out = handler
            .handle(Some(Params::Positional(vec![json!(1)])))
            .await
            .unwrap();
        assert_eq!(out, json!({"positional": true}));

        let none = handler.handle(None).await.unwrap();
        assert_eq!(none, json!({"positional": null}));
    }

    #[tokio::test]
    async fn test_typed_named_params() {
        #[derive(Deserialize)]
        struct Add {
            a: i64,
            b: i64,
        }

        let handler = from_typed_fn(|p: Add| async move { Ok(p.a + p.b) });
        let params = Params::from_value(json!({"a": 2, "b": 3})).unwrap();
        assert_eq!(handler.handle(Some(params)).await.unwrap(), json!(5));
    }

    #[tokio::test]
    async fn test_typed_positional_params() {
        let handler = from_typed_fn(|(a, b): (i64, i64)| async move { Ok(a * b) });
        let params = Params::Positional(vec![json!(4), json!(5)]);
        assert_eq!(handler.handle(Some(params)).await.unwrap(), json!(20));
    }

    #[tokio::test]
    async fn test_typed_unit_params() {
        let handler = from_typed_fn(|_: ()| async move { Ok("pong") });
        assert_eq!(handler.handle(None).await.unwrap(), json!("pong"));
    }

    #[tokio::test]
    async fn test_typed_bad_params() {
        let handler = from_typed_fn(|(a,): (i64,)| async move { Ok(a) });
        let err = handler
            .handle(Some(Params::Positional(vec![json!("nope")])))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParams(_)));
    }

    #[tokio::test]
    async fn test_application_error_survives() {
        let handler = from_typed_fn(|_: ()| async move {
            Err::<(), _>(Error::Rpc(ErrorObject::new(4001, "nope")))
        });
        let err = handler.handle(None).await.unwrap_err();
        assert_eq!(err.rpc_code(), Some(4001));
    }
}
