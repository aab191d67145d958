//! Transaction context: owner of baselines, deltas, listeners and handles.
//!
//! # Responsibility
//! - Wrap plain field maps as handles with a fresh identity and empty delta.
//! - Implement commit/rollback/delta/clone for one identity at a time.
//! - Emit one audit entry per verb and dispatch lifecycle events.
//!
//! # Invariants
//! - Baselines change only in `commit`.
//! - Each verb stamps its audit entry and mutates/resets under one state
//!   lock; the audit sink and listeners run after the lock is released and
//!   may re-enter any verb.
//! - Listener failures propagate; the merge or reset already done is kept.
//! - Clones start from the original construction data, not the current
//!   baselines, and reuse the source identities index for index.

use crate::audit::sink::{AuditEntry, AuditOperation, AuditSink, LogAuditSink};
use crate::capability::methods::SharedMethods;
use crate::events::bus::{dispatch, EventBus, Listener, ListenerResult};
use crate::events::channel::EventChannel;
use crate::model::delta::Delta;
use crate::model::record::{has_reserved_field, Fields, Record, RecordId, RESERVED_ID_FIELD};
use crate::store::delta_store::{CloneMode, DeltaStore, WriteOutcome};
use crate::txn::error::{TransactionError, TransactionResult};
use crate::txn::handle::{FieldDescriptor, FieldSource, RecordHandle};
use log::{debug, info, warn};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Construction-time settings for a context and its clones.
#[derive(Clone)]
pub struct TransactionOptions {
    pub clone_mode: CloneMode,
    pub audit_sink: Arc<dyn AuditSink>,
}

impl TransactionOptions {
    pub fn with_clone_mode(mut self, clone_mode: CloneMode) -> Self {
        self.clone_mode = clone_mode;
        self
    }

    pub fn with_audit_sink(mut self, audit_sink: Arc<dyn AuditSink>) -> Self {
        self.audit_sink = audit_sink;
        self
    }
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self {
            clone_mode: CloneMode::default(),
            audit_sink: Arc::new(LogAuditSink),
        }
    }
}

impl Debug for TransactionOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionOptions")
            .field("clone_mode", &self.clone_mode)
            .finish_non_exhaustive()
    }
}

struct ContextState {
    records: Vec<Record>,
    deltas: DeltaStore,
}

/// Shared state behind a context and all of its handles.
pub(crate) struct ContextInner {
    origin: Vec<Record>,
    positions: BTreeMap<RecordId, usize>,
    methods: Option<Arc<dyn SharedMethods>>,
    options: TransactionOptions,
    state: Mutex<ContextState>,
    events: Mutex<EventBus>,
}

/// In-memory change-tracking context over an ordered set of records.
pub struct TransactionContext {
    inner: Arc<ContextInner>,
}

impl TransactionContext {
    /// Wraps `records` with default options.
    ///
    /// # Errors
    /// - `ReservedField` when a record already carries the `id` field.
    pub fn create<I>(records: I, methods: Option<Arc<dyn SharedMethods>>) -> TransactionResult<Self>
    where
        I: IntoIterator<Item = Fields>,
    {
        Self::with_options(records, methods, TransactionOptions::default())
    }

    /// Wraps `records` with explicit options.
    ///
    /// # Errors
    /// - `ReservedField` when a record already carries the `id` field.
    pub fn with_options<I>(
        records: I,
        methods: Option<Arc<dyn SharedMethods>>,
        options: TransactionOptions,
    ) -> TransactionResult<Self>
    where
        I: IntoIterator<Item = Fields>,
    {
        let mut origin = Vec::new();
        for (index, fields) in records.into_iter().enumerate() {
            if has_reserved_field(&fields) {
                warn!(
                    "event=txn_create module=txn status=error index={} error_code=reserved_field",
                    index
                );
                return Err(TransactionError::ReservedField { index });
            }
            origin.push(Record::new(fields));
        }

        let mut deltas = DeltaStore::new();
        for record in &origin {
            deltas.init(record.id);
        }
        Ok(Self::assemble(origin, methods, options, deltas))
    }

    fn assemble(
        origin: Vec<Record>,
        methods: Option<Arc<dyn SharedMethods>>,
        options: TransactionOptions,
        deltas: DeltaStore,
    ) -> Self {
        let positions = origin
            .iter()
            .enumerate()
            .map(|(position, record)| (record.id, position))
            .collect();
        info!(
            "event=txn_create module=txn status=ok records={} clone_mode={:?} methods={}",
            origin.len(),
            options.clone_mode,
            methods.as_ref().map_or(0, |methods| methods.method_names().len())
        );

        let state = ContextState {
            records: origin.clone(),
            deltas,
        };
        Self {
            inner: Arc::new(ContextInner {
                origin,
                positions,
                methods,
                options,
                state: Mutex::new(state),
                events: Mutex::new(EventBus::new()),
            }),
        }
    }

    /// Handles for every record, index-aligned with the construction input.
    pub fn dataset(&self) -> Vec<RecordHandle> {
        self.inner
            .origin
            .iter()
            .map(|record| RecordHandle::new(Arc::clone(&self.inner), record.id))
            .collect()
    }

    pub fn handle(&self, index: usize) -> Option<RecordHandle> {
        let record = self.inner.origin.get(index)?;
        Some(RecordHandle::new(Arc::clone(&self.inner), record.id))
    }

    pub fn handle_by_id(&self, id: RecordId) -> Option<RecordHandle> {
        self.inner
            .positions
            .contains_key(&id)
            .then(|| RecordHandle::new(Arc::clone(&self.inner), id))
    }

    /// Identities in dataset order.
    pub fn ids(&self) -> Vec<RecordId> {
        self.inner.origin.iter().map(|record| record.id).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.origin.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.origin.is_empty()
    }

    pub fn options(&self) -> &TransactionOptions {
        &self.inner.options
    }

    pub fn commit(&self, id: RecordId) -> TransactionResult<()> {
        self.inner.commit(id)
    }

    pub fn rollback(&self, id: RecordId) -> TransactionResult<()> {
        self.inner.rollback(id)
    }

    pub fn delta(&self, id: RecordId) -> TransactionResult<Delta> {
        self.inner.delta(id)
    }

    pub fn clone_context(&self, id: RecordId) -> TransactionResult<TransactionContext> {
        self.inner.clone_context(id)
    }

    pub fn on<F>(&self, channel: EventChannel, listener: F)
    where
        F: Fn(&Record, &Delta) -> ListenerResult + Send + Sync + 'static,
    {
        self.inner.subscribe(channel, Arc::new(listener));
    }

    pub fn listener_count(&self, channel: EventChannel) -> usize {
        self.inner.lock_events().listener_count(channel)
    }
}

impl Debug for TransactionContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionContext")
            .field("records", &self.len())
            .field("options", &self.inner.options)
            .finish()
    }
}

impl ContextInner {
    fn lock_state(&self) -> MutexGuard<'_, ContextState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_events(&self) -> MutexGuard<'_, EventBus> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn position(&self, id: RecordId) -> TransactionResult<usize> {
        self.positions
            .get(&id)
            .copied()
            .ok_or(TransactionError::UnknownRecord(id))
    }

    pub(crate) fn methods(&self) -> Option<&Arc<dyn SharedMethods>> {
        self.methods.as_ref()
    }

    pub(crate) fn pending_value(&self, id: RecordId, key: &str) -> Option<Value> {
        self.lock_state().deltas.pending_value(id, key)
    }

    pub(crate) fn baseline_value(&self, id: RecordId, key: &str) -> Option<Value> {
        let position = self.position(id).ok()?;
        let state = self.lock_state();
        state.records.get(position)?.get(key).cloned()
    }

    pub(crate) fn write_field(&self, id: RecordId, key: &str, value: Value) -> Option<WriteOutcome> {
        let position = self.position(id).ok()?;
        let state = self.lock_state();
        let baseline = state.records.get(position)?.get(key);
        state.deltas.write(id, key, value, baseline)
    }

    pub(crate) fn keys(&self, id: RecordId) -> Vec<String> {
        let Ok(position) = self.position(id) else {
            return Vec::new();
        };
        let state = self.lock_state();
        let Some(record) = state.records.get(position) else {
            return Vec::new();
        };
        let mut keys: Vec<String> = record.fields.keys().cloned().collect();
        if let Some(delta) = state.deltas.snapshot(id) {
            for key in delta.keys() {
                if !record.contains(key) {
                    keys.push(key.clone());
                }
            }
        }
        keys.retain(|key| key != RESERVED_ID_FIELD);
        keys
    }

    pub(crate) fn describe(&self, id: RecordId, key: &str) -> Option<FieldDescriptor> {
        if key == RESERVED_ID_FIELD {
            return None;
        }
        if let Some(value) = self.pending_value(id, key) {
            return Some(FieldDescriptor {
                key: key.to_string(),
                value,
                source: FieldSource::Pending,
            });
        }
        self.baseline_value(id, key).map(|value| FieldDescriptor {
            key: key.to_string(),
            value,
            source: FieldSource::Baseline,
        })
    }

    pub(crate) fn baseline(&self, id: RecordId) -> Option<Record> {
        let position = self.position(id).ok()?;
        self.lock_state().records.get(position).cloned()
    }

    pub(crate) fn materialize(&self, id: RecordId) -> Option<Fields> {
        let position = self.position(id).ok()?;
        let state = self.lock_state();
        let mut fields = state.records.get(position)?.fields.clone();
        if let Some(delta) = state.deltas.snapshot(id) {
            delta.apply_to(&mut fields);
        }
        Some(fields)
    }

    pub(crate) fn is_dirty(&self, id: RecordId) -> bool {
        self.lock_state().deltas.is_dirty(id)
    }

    pub(crate) fn commit(&self, id: RecordId) -> TransactionResult<()> {
        let position = self.position(id)?;
        let (entry, target, merged) = {
            let mut guard = self.lock_state();
            let state = &mut *guard;
            let merged = state.deltas.snapshot(id).unwrap_or_default();
            let entry = AuditEntry::now(id, AuditOperation::Commit, merged.clone());

            let record = state
                .records
                .get_mut(position)
                .ok_or(TransactionError::UnknownRecord(id))?;
            merged.apply_to(&mut record.fields);
            let target = record.clone();
            state.deltas.reset(id);
            (entry, target, merged)
        };
        self.audit(&entry);

        info!(
            "event=txn_commit module=txn status=ok id={} changes={}",
            id,
            merged.len()
        );
        self.fire(EventChannel::Commit, &target, &merged)
    }

    pub(crate) fn rollback(&self, id: RecordId) -> TransactionResult<()> {
        let position = self.position(id)?;
        let (entry, target, discarded) = {
            let mut guard = self.lock_state();
            let state = &mut *guard;
            let pending = state.deltas.snapshot(id).unwrap_or_default();
            let entry = AuditEntry::now(id, AuditOperation::Rollback, pending.clone());

            let discarded = state.deltas.reset(id).unwrap_or(pending);
            let target = state
                .records
                .get(position)
                .cloned()
                .ok_or(TransactionError::UnknownRecord(id))?;
            (entry, target, discarded)
        };
        self.audit(&entry);

        info!(
            "event=txn_rollback module=txn status=ok id={} discarded={}",
            id,
            discarded.len()
        );
        self.fire(EventChannel::Rollback, &target, &discarded)
    }

    pub(crate) fn delta(&self, id: RecordId) -> TransactionResult<Delta> {
        self.position(id)?;
        let current = self.lock_state().deltas.snapshot(id).unwrap_or_default();
        self.audit(&AuditEntry::now(id, AuditOperation::GetDelta, current.clone()));
        Ok(current)
    }

    pub(crate) fn clone_context(&self, id: RecordId) -> TransactionResult<TransactionContext> {
        self.position(id)?;
        let mut deltas = DeltaStore::new();
        for record in &self.origin {
            deltas.init(record.id);
        }

        let entry = {
            let state = self.lock_state();
            deltas.copy_from(&state.deltas, self.options.clone_mode);
            let current = state.deltas.snapshot(id).unwrap_or_default();
            AuditEntry::now(id, AuditOperation::Clone, current)
        };
        self.audit(&entry);

        info!(
            "event=txn_clone module=txn status=ok id={} mode={:?}",
            id, self.options.clone_mode
        );
        Ok(TransactionContext::assemble(
            self.origin.clone(),
            self.methods.clone(),
            self.options.clone(),
            deltas,
        ))
    }

    pub(crate) fn subscribe(&self, channel: EventChannel, listener: Listener) {
        self.lock_events().subscribe(channel, listener);
        debug!(
            "event=listener_add module=txn status=ok channel={}",
            channel
        );
    }

    pub(crate) fn subscribe_named(&self, name: &str, listener: Listener) -> bool {
        let matched = self.lock_events().subscribe_named(name, listener);
        if matched {
            debug!("event=listener_add module=txn status=ok channel={}", name);
        } else {
            debug!(
                "event=listener_add module=txn status=ignored channel={}",
                name
            );
        }
        matched
    }

    fn audit(&self, entry: &AuditEntry) {
        self.options.audit_sink.record(entry);
    }

    fn fire(&self, channel: EventChannel, target: &Record, delta: &Delta) -> TransactionResult<()> {
        let listeners = self.lock_events().listeners(channel);
        dispatch(&listeners, target, delta).map_err(|failure| {
            warn!(
                "event=listener_failed module=txn status=error channel={} id={} index={} error={}",
                channel, target.id, failure.index, failure.source
            );
            TransactionError::Listener {
                channel,
                id: target.id,
                index: failure.index,
                source: failure.source,
            }
        })
    }
}
