//! Procedural macros for jrpc
//!
//! `#[handler]` turns an async function with typed params into a factory
//! returning a [`jrpc_server::Method`], ready for
//! `MethodRegistry::register_method`.
//!
//! ```ignore
//! use jrpc::{handler, Result};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Add {
//!     a: i64,
//!     b: i64,
//! }
//!
//! #[handler(named)]
//! async fn add(params: Add) -> Result<i64> {
//!     Ok(params.a + params.b)
//! }
//!
//! registry.register_method("add", add()).await?;
//! ```

mod handler;

use proc_macro::TokenStream;
use syn::parse_macro_input;

/// Define a JSON-RPC method from an async function
///
/// The function takes at most one parameter, whose type must implement
/// `Deserialize`, and returns `jrpc_core::Result<T>` with `T: Serialize`.
/// With no parameter, params must be absent or `null`.
///
/// An optional argument restricts the accepted parameter shape:
///
/// - `#[handler]` or `#[handler(either)]`: array or object
/// - `#[handler(positional)]`: arrays only
/// - `#[handler(named)]`: objects only
///
/// Params that fail to deserialize produce an Invalid params error.
#[proc_macro_attribute]
pub fn handler(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input_fn = parse_macro_input!(item as syn::ItemFn);

    handler::convention(attr.into())
        .and_then(|convention| handler::expand(convention, input_fn))
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
