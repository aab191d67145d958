//! Shared capability methods available on every handle of a context.
//!
//! # Responsibility
//! - Declare the method set records of one context opt into.
//! - Invoke a method with the calling handle as its receiver.
//!
//! # Invariants
//! - Methods are the last step of field resolution: verbs, pending values
//!   and baseline fields with the same name shadow them.
//! - The receiver is the handle, so methods observe pending values.

use crate::txn::handle::RecordHandle;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Named method set shared by every record in a context.
pub trait SharedMethods: Send + Sync {
    fn has_method(&self, name: &str) -> bool;

    /// Invokes `name` with `this` as receiver; `None` when no such method.
    fn call_method(&self, name: &str, this: &RecordHandle) -> Option<Value>;

    fn method_names(&self) -> Vec<String>;
}

/// One shared method body.
pub type Method = Arc<dyn Fn(&RecordHandle) -> Value + Send + Sync>;

/// Closure-backed `SharedMethods` implementation.
#[derive(Clone, Default)]
pub struct MethodTable {
    methods: BTreeMap<String, Method>,
}

impl MethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces `name`.
    pub fn with_method<F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(&RecordHandle) -> Value + Send + Sync + 'static,
    {
        self.methods.insert(name.into(), Arc::new(method));
        self
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl SharedMethods for MethodTable {
    fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    fn call_method(&self, name: &str, this: &RecordHandle) -> Option<Value> {
        let method = self.methods.get(name)?;
        Some(method(this))
    }

    fn method_names(&self) -> Vec<String> {
        self.methods.keys().cloned().collect()
    }
}

impl Debug for MethodTable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodTable")
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}
