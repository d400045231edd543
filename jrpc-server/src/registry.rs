//! Method registry
//!
//! Maps method names to handlers and the parameter convention each one
//! accepts. A registry is a cheap handle: clones share the same table, so
//! the dispatcher and application code can register and unregister methods
//! at runtime while requests are in flight.
//!
//! The table sits behind a `tokio::sync::RwLock`. Lookups take the read
//! lock only long enough to clone the entry's `Arc`, so handlers never run
//! under the lock.
//!
//! Unregistering a name that is not bound is a no-op; the return value says
//! whether anything was removed.

use crate::handler::Handler;
use jrpc_core::{Error, Params, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Parameter shapes a method accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamConvention {
    /// Array params only
    Positional,
    /// Object params only
    Named,
    /// Either shape
    #[default]
    Either,
}

impl ParamConvention {
    /// Check params against this convention
    ///
    /// Absent params are accepted by every convention; handlers that need
    /// arguments report their own `InvalidParams`.
    pub fn check(self, params: Option<&Params>) -> Result<()> {
        match (self, params) {
            (ParamConvention::Positional, Some(Params::Named(_))) => Err(Error::InvalidParams(
                "method takes positional params, got an object".into(),
            )),
            (ParamConvention::Named, Some(Params::Positional(_))) => Err(Error::InvalidParams(
                "method takes named params, got an array".into(),
            )),
            _ => Ok(()),
        }
    }
}

/// A handler together with its parameter convention
pub struct Method {
    pub handler: Box<dyn Handler>,
    pub convention: ParamConvention,
}

impl Method {
    pub fn new(handler: Box<dyn Handler>, convention: ParamConvention) -> Self {
        Self {
            handler,
            convention,
        }
    }
}

/// A method as stored in the registry
#[derive(Clone)]
pub struct RegisteredMethod {
    name: Arc<str>,
    handler: Arc<dyn Handler>,
    convention: ParamConvention,
}

impl RegisteredMethod {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn convention(&self) -> ParamConvention {
        self.convention
    }

    /// Validate params against the convention, then run the handler
    ///
    /// Panics raised by the handler are not caught here.
    pub async fn invoke(&self, params: Option<Params>) -> Result<Value> {
        self.convention.check(params.as_ref())?;
        self.handler.handle(params).await
    }
}

impl fmt::Debug for RegisteredMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredMethod")
            .field("name", &self.name)
            .field("convention", &self.convention)
            .finish()
    }
}

/// Shared name → method table
#[derive(Clone, Default)]
pub struct MethodRegistry {
    methods: Arc<RwLock<HashMap<String, RegisteredMethod>>>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `handler`
    ///
    /// Fails with `DuplicateMethod` if the name is already bound; the
    /// existing binding is left untouched.
    pub async fn register(
        &self,
        name: impl Into<String>,
        handler: Box<dyn Handler>,
        convention: ParamConvention,
    ) -> Result<()> {
        self.register_method(name, Method::new(handler, convention)).await
    }

    /// Bind `name` to a prepared [`Method`]
    pub async fn register_method(&self, name: impl Into<String>, method: Method) -> Result<()> {
        let name = name.into();
        let mut methods = self.methods.write().await;
        if methods.contains_key(&name) {
            return Err(Error::DuplicateMethod(name));
        }
        let entry = RegisteredMethod {
            name: Arc::from(name.as_str()),
            handler: Arc::from(method.handler),
            convention: method.convention,
        };
        tracing::debug!(method = %name, convention = ?method.convention, "method registered");
        methods.insert(name, entry);
        Ok(())
    }

    /// Remove `name`, returning whether it was bound
    pub async fn unregister(&self, name: &str) -> bool {
        let removed = self.methods.write().await.remove(name).is_some();
        if removed {
            tracing::debug!(method = %name, "method unregistered");
        }
        removed
    }

    pub async fn lookup(&self, name: &str) -> Option<RegisteredMethod> {
        self.methods.read().await.get(name).cloned()
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.methods.read().await.contains_key(name)
    }

    /// Registered method names, sorted
    pub async fn methods(&self) -> Vec<String> {
        let mut names: Vec<String> = self.methods.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn len(&self) -> usize {
        self.methods.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.methods.read().await.is_empty()
    }
}
