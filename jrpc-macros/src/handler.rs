//! Expansion of `#[handler]`
//!
//! Input:
//! ```ignore
//! #[handler(positional)]
//! async fn add(params: (i64, i64)) -> Result<i64> {
//!     Ok(params.0 + params.1)
//! }
//! ```
//!
//! Output:
//! ```ignore
//! fn add() -> jrpc_server::Method {
//!     async fn inner_handler(params: (i64, i64)) -> Result<i64> {
//!         Ok(params.0 + params.1)
//!     }
//!     jrpc_server::Method::new(
//!         jrpc_server::from_typed_fn(inner_handler),
//!         jrpc_server::ParamConvention::Positional,
//!     )
//! }
//! ```

use proc_macro2::{Span, TokenStream};
use quote::quote;
use syn::{FnArg, Ident, ItemFn, ReturnType};

/// Parse the attribute arguments into a `ParamConvention` path
pub fn convention(attr: TokenStream) -> syn::Result<TokenStream> {
    if attr.is_empty() {
        return Ok(quote! { jrpc_server::ParamConvention::Either });
    }

    let ident: Ident = syn::parse2(attr)?;
    let variant = match ident.to_string().as_str() {
        "positional" => Ident::new("Positional", Span::call_site()),
        "named" => Ident::new("Named", Span::call_site()),
        "either" => Ident::new("Either", Span::call_site()),
        other => {
            return Err(syn::Error::new(
                ident.span(),
                format!("unknown parameter convention `{other}`, expected `positional`, `named` or `either`"),
            ))
        }
    };
    Ok(quote! { jrpc_server::ParamConvention::#variant })
}

pub fn expand(convention: TokenStream, input_fn: ItemFn) -> syn::Result<TokenStream> {
    if input_fn.sig.asyncness.is_none() {
        return Err(syn::Error::new_spanned(
            input_fn.sig.fn_token,
            "#[handler] requires an async fn",
        ));
    }
    if input_fn.sig.inputs.len() > 1 {
        return Err(syn::Error::new_spanned(
            &input_fn.sig.inputs,
            "#[handler] functions take at most one parameter",
        ));
    }

    let fn_name = &input_fn.sig.ident;
    let fn_vis = &input_fn.vis;
    let fn_block = &input_fn.block;
    let fn_attrs = &input_fn.attrs;

    let param_type = match input_fn.sig.inputs.first() {
        Some(FnArg::Typed(pat_type)) => {
            let ty = &pat_type.ty;
            quote! { #ty }
        }
        Some(FnArg::Receiver(receiver)) => {
            return Err(syn::Error::new_spanned(
                receiver,
                "#[handler] cannot be used on methods",
            ))
        }
        None => quote! { () },
    };

    // The original parameter pattern is kept so the body can destructure it.
    let param_pat = match input_fn.sig.inputs.first() {
        Some(FnArg::Typed(pat_type)) => {
            let pat = &pat_type.pat;
            quote! { #pat }
        }
        _ => quote! { _ },
    };

    let return_type = match &input_fn.sig.output {
        ReturnType::Type(_, ty) => quote! { #ty },
        ReturnType::Default => {
            return Err(syn::Error::new_spanned(
                &input_fn.sig,
                "#[handler] functions must return jrpc_core::Result<T>",
            ))
        }
    };

    Ok(quote! {
        #(#fn_attrs)*
        #fn_vis fn #fn_name() -> jrpc_server::Method {
            async fn inner_handler(#param_pat: #param_type) -> #return_type #fn_block

            jrpc_server::Method::new(jrpc_server::from_typed_fn(inner_handler), #convention)
        }
    })
}
