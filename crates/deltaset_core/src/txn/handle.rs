//! Record handle: the interception surface callers use in place of a record.
//!
//! # Responsibility
//! - Route field reads through the record's delta before its baseline.
//! - Buffer field writes in the delta instead of mutating the baseline.
//! - Expose transaction verbs bound to this handle's own identity.
//!
//! # Invariants
//! - Resolution order is verb, identity, pending value, baseline value,
//!   shared method, absent.
//! - A write equal to the current baseline value removes the pending entry.
//! - Enumeration and `describe` follow the same shadowing rule as reads.
//! - The reserved identity field is readable but never writable.

use crate::events::bus::{Listener, ListenerResult};
use crate::events::channel::EventChannel;
use crate::model::delta::Delta;
use crate::model::record::{Fields, Record, RecordId, RESERVED_ID_FIELD};
use crate::txn::context::{ContextInner, TransactionContext};
use crate::txn::error::{TransactionError, TransactionResult};
use log::{debug, warn};
use serde_json::Value;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Transaction operation exposed on every handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Commit,
    Rollback,
    On,
    Clone,
    Delta,
}

impl Verb {
    pub const ALL: [Verb; 5] = [
        Self::Commit,
        Self::Rollback,
        Self::On,
        Self::Clone,
        Self::Delta,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Commit => "commit",
            Self::Rollback => "rollback",
            Self::On => "on",
            Self::Clone => "clone",
            Self::Delta => "delta",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|verb| verb.as_str() == name)
    }
}

/// Where a field value was resolved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    Pending,
    Baseline,
}

/// Introspection result for one enumerable field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub key: String,
    pub value: Value,
    pub source: FieldSource,
}

/// Outcome of resolving a key on a handle.
#[derive(Debug)]
pub enum Resolved {
    Verb(BoundVerb),
    Identity(RecordId),
    Pending(Value),
    Stored(Value),
    Method(BoundMethod),
    Absent,
}

impl Resolved {
    /// Field value for data resolutions; `None` for verbs, methods, absence.
    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Identity(id) => Some(Value::String(id.to_string())),
            Self::Pending(value) | Self::Stored(value) => Some(value),
            Self::Verb(_) | Self::Method(_) | Self::Absent => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

/// Result of invoking a nullary verb.
#[derive(Debug)]
pub enum VerbOutput {
    Committed,
    RolledBack,
    Delta(Delta),
    Cloned(TransactionContext),
}

/// Verb bound to one handle's identity.
///
/// Can be stored and invoked later; it always acts on the identity's delta as
/// it is at invocation time.
#[derive(Debug, Clone)]
pub struct BoundVerb {
    handle: RecordHandle,
    verb: Verb,
}

impl BoundVerb {
    pub fn verb(&self) -> Verb {
        self.verb
    }

    pub fn target(&self) -> RecordId {
        self.handle.id()
    }

    /// Runs the verb. `Verb::On` needs a listener, use `listen` instead.
    pub fn invoke(&self) -> TransactionResult<VerbOutput> {
        match self.verb {
            Verb::Commit => self.handle.commit().map(|()| VerbOutput::Committed),
            Verb::Rollback => self.handle.rollback().map(|()| VerbOutput::RolledBack),
            Verb::Delta => self.handle.delta().map(VerbOutput::Delta),
            Verb::Clone => self.handle.clone_context().map(VerbOutput::Cloned),
            Verb::On => Err(TransactionError::VerbNeedsArguments(Verb::On)),
        }
    }

    /// Registers `listener` on the channel called `event`.
    pub fn listen(&self, event: &str, listener: Listener) -> bool {
        self.handle.context.subscribe_named(event, listener)
    }
}

/// Shared method bound to one handle as receiver.
#[derive(Debug, Clone)]
pub struct BoundMethod {
    handle: RecordHandle,
    name: String,
}

impl BoundMethod {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self) -> Value {
        self.handle
            .context
            .methods()
            .and_then(|methods| methods.call_method(&self.name, &self.handle))
            .unwrap_or(Value::Null)
    }
}

/// Interception surface for one wrapped record.
#[derive(Clone)]
pub struct RecordHandle {
    context: Arc<ContextInner>,
    id: RecordId,
}

impl RecordHandle {
    pub(crate) fn new(context: Arc<ContextInner>, id: RecordId) -> Self {
        Self { context, id }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    /// Resolves `key` using the full handle resolution order.
    pub fn resolve(&self, key: &str) -> Resolved {
        debug!(
            "event=field_read module=handle id={} key={}",
            self.id, key
        );

        if let Some(verb) = Verb::parse(key) {
            return Resolved::Verb(BoundVerb {
                handle: self.clone(),
                verb,
            });
        }
        if key == RESERVED_ID_FIELD {
            return Resolved::Identity(self.id);
        }
        if let Some(value) = self.context.pending_value(self.id, key) {
            return Resolved::Pending(value);
        }
        if let Some(value) = self.context.baseline_value(self.id, key) {
            return Resolved::Stored(value);
        }
        if self
            .context
            .methods()
            .is_some_and(|methods| methods.has_method(key))
        {
            return Resolved::Method(BoundMethod {
                handle: self.clone(),
                name: key.to_string(),
            });
        }
        Resolved::Absent
    }

    /// Reads a field value, shadowed by any pending write.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.resolve(key).into_value()
    }

    /// Buffers a write for `key`.
    ///
    /// Writing the current baseline value drops the pending entry instead.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        if key == RESERVED_ID_FIELD {
            warn!(
                "event=field_write module=handle status=ignored id={} key={} reason=reserved_field",
                self.id, key
            );
            return;
        }
        if let Some(outcome) = self.context.write_field(self.id, key, value) {
            debug!(
                "event=field_write module=handle status={} id={} key={}",
                outcome.as_str(),
                self.id,
                key
            );
        }
    }

    /// Invokes a shared method with this handle as receiver.
    pub fn call(&self, method: &str) -> Option<Value> {
        match self.resolve(method) {
            Resolved::Method(bound) => Some(bound.call()),
            _ => None,
        }
    }

    /// Enumerable field names: baseline keys, then pending-only keys.
    pub fn keys(&self) -> Vec<String> {
        self.context.keys(self.id)
    }

    /// Introspects `key` under the shadowing rule.
    pub fn describe(&self, key: &str) -> Option<FieldDescriptor> {
        self.context.describe(self.id, key)
    }

    /// Copy of the committed baseline.
    pub fn baseline(&self) -> Record {
        self.context
            .baseline(self.id)
            .unwrap_or_else(|| Record::with_id(self.id, Fields::new()))
    }

    /// Baseline overlaid with pending values, as reads currently see it.
    pub fn materialize(&self) -> Fields {
        self.context.materialize(self.id).unwrap_or_default()
    }

    pub fn is_dirty(&self) -> bool {
        self.context.is_dirty(self.id)
    }

    /// Merges pending changes into the baseline.
    pub fn commit(&self) -> TransactionResult<()> {
        self.context.commit(self.id)
    }

    /// Discards pending changes.
    pub fn rollback(&self) -> TransactionResult<()> {
        self.context.rollback(self.id)
    }

    /// Returns the pending changes for this record.
    pub fn delta(&self) -> TransactionResult<Delta> {
        self.context.delta(self.id)
    }

    /// Builds a new context from the original construction data carrying
    /// over the current delta state.
    pub fn clone_context(&self) -> TransactionResult<TransactionContext> {
        self.context.clone_context(self.id)
    }

    /// Registers a listener on the owning context.
    ///
    /// Listeners are context-wide: they fire for every record's verbs.
    pub fn on<F>(&self, channel: EventChannel, listener: F)
    where
        F: Fn(&Record, &Delta) -> ListenerResult + Send + Sync + 'static,
    {
        self.context.subscribe(channel, Arc::new(listener));
    }

    /// Registers a listener by channel name; unknown names are ignored.
    pub fn on_named<F>(&self, name: &str, listener: F) -> bool
    where
        F: Fn(&Record, &Delta) -> ListenerResult + Send + Sync + 'static,
    {
        self.context.subscribe_named(name, Arc::new(listener))
    }
}

impl Debug for RecordHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordHandle")
            .field("id", &self.id)
            .field("fields", &self.materialize())
            .finish()
    }
}
