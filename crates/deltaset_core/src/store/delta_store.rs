//! Identity-keyed store of pending deltas.
//!
//! # Responsibility
//! - Hold exactly one delta per wrapped record for the context lifetime.
//! - Apply the write/collapse rule against the record's baseline value.
//! - Copy delta state into a cloned context under the configured `CloneMode`.
//!
//! # Invariants
//! - Entries are created at wrap time and never removed, only reset.
//! - `reset` installs a fresh delta object, so an alias shared with a
//!   clone is detached on the resetting side only.

use crate::model::delta::Delta;
use crate::model::record::{same_value, RecordId};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One identity's delta, shareable between a context and its clones.
pub type SharedDelta = Arc<Mutex<Delta>>;

/// How per-identity delta state is carried into a cloned context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CloneMode {
    /// Dirty deltas are shared by reference: in-place writes on either side
    /// are visible through both contexts until one side resets them.
    /// Clean identities get a fresh delta in the clone.
    #[default]
    Shared,
    /// Every delta is deep-copied; the clone starts from a snapshot.
    Isolated,
}

/// Result of routing one write through the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Value differs from baseline and is now pending.
    Pending,
    /// Value equals baseline; any pending entry for the key was dropped.
    Collapsed,
}

impl WriteOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Collapsed => "collapsed",
        }
    }
}

/// Mapping from record identity to its pending delta.
#[derive(Debug, Default)]
pub struct DeltaStore {
    entries: BTreeMap<RecordId, SharedDelta>,
}

impl DeltaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking `id` with an empty delta.
    pub fn init(&mut self, id: RecordId) {
        self.entries.insert(id, fresh_delta());
    }

    /// Returns the live delta object for `id`.
    pub fn entry(&self, id: RecordId) -> Option<SharedDelta> {
        self.entries.get(&id).cloned()
    }

    /// Returns a copy of the pending changes for `id`.
    pub fn snapshot(&self, id: RecordId) -> Option<Delta> {
        self.entries.get(&id).map(|delta| lock_delta(delta).clone())
    }

    /// Returns the pending value for `key`, if the delta shadows it.
    pub fn pending_value(&self, id: RecordId, key: &str) -> Option<Value> {
        let delta = self.entries.get(&id)?;
        let guard = lock_delta(delta);
        guard.get(key).cloned()
    }

    pub fn is_dirty(&self, id: RecordId) -> bool {
        self.entries
            .get(&id)
            .is_some_and(|delta| !lock_delta(delta).is_empty())
    }

    /// Routes one write: collapses when `value` equals `baseline` under
    /// `same_value`, otherwise records it as pending.
    ///
    /// Returns `None` when `id` is not tracked.
    pub fn write(
        &self,
        id: RecordId,
        key: &str,
        value: Value,
        baseline: Option<&Value>,
    ) -> Option<WriteOutcome> {
        let delta = self.entries.get(&id)?;
        let mut guard = lock_delta(delta);
        if baseline.is_some_and(|current| same_value(current, &value)) {
            guard.remove(key);
            return Some(WriteOutcome::Collapsed);
        }
        guard.insert(key, value);
        Some(WriteOutcome::Pending)
    }

    /// Replaces the delta for `id` with a fresh empty one and returns the
    /// discarded contents.
    pub fn reset(&mut self, id: RecordId) -> Option<Delta> {
        let previous = self.entries.get_mut(&id)?;
        let discarded = std::mem::replace(previous, fresh_delta());
        let snapshot = lock_delta(&discarded).clone();
        Some(snapshot)
    }

    /// Copies every entry of `source` into this store.
    pub fn copy_from(&mut self, source: &DeltaStore, mode: CloneMode) {
        for (id, delta) in &source.entries {
            let copied = match mode {
                CloneMode::Shared => {
                    if lock_delta(delta).is_empty() {
                        fresh_delta()
                    } else {
                        Arc::clone(delta)
                    }
                }
                CloneMode::Isolated => Arc::new(Mutex::new(lock_delta(delta).clone())),
            };
            self.entries.insert(*id, copied);
        }
    }
}

fn fresh_delta() -> SharedDelta {
    Arc::new(Mutex::new(Delta::new()))
}

/// Locks one delta, recovering the data if a previous holder panicked.
pub fn lock_delta(delta: &SharedDelta) -> MutexGuard<'_, Delta> {
    delta.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::{CloneMode, DeltaStore, WriteOutcome};
    use serde_json::json;
    use std::sync::Arc;
    use uuid::Uuid;

    #[test]
    fn write_records_pending_value_and_collapses_on_baseline() {
        let id = Uuid::new_v4();
        let mut store = DeltaStore::new();
        store.init(id);

        let baseline = json!(1);
        assert_eq!(
            store.write(id, "born", json!(2), Some(&baseline)),
            Some(WriteOutcome::Pending)
        );
        assert_eq!(store.pending_value(id, "born"), Some(json!(2)));
        assert!(store.is_dirty(id));

        assert_eq!(
            store.write(id, "born", json!(1), Some(&baseline)),
            Some(WriteOutcome::Collapsed)
        );
        assert!(!store.is_dirty(id));
    }

    #[test]
    fn write_to_untracked_identity_is_rejected() {
        let store = DeltaStore::new();
        assert_eq!(store.write(Uuid::new_v4(), "born", json!(2), None), None);
    }

    #[test]
    fn reset_returns_discarded_snapshot_and_detaches_entry() {
        let id = Uuid::new_v4();
        let mut store = DeltaStore::new();
        store.init(id);
        store.write(id, "born", json!(5), None);
        let before = store.entry(id).expect("tracked");

        let discarded = store.reset(id).expect("tracked");
        assert_eq!(discarded.get("born"), Some(&json!(5)));
        assert!(!store.is_dirty(id));

        let after = store.entry(id).expect("tracked");
        assert!(!Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn shared_copy_aliases_dirty_entries_only() {
        let dirty = Uuid::new_v4();
        let clean = Uuid::new_v4();
        let mut source = DeltaStore::new();
        source.init(dirty);
        source.init(clean);
        source.write(dirty, "born", json!(9), None);

        let mut copy = DeltaStore::new();
        copy.copy_from(&source, CloneMode::Shared);

        let source_dirty = source.entry(dirty).expect("tracked");
        let copy_dirty = copy.entry(dirty).expect("copied");
        assert!(Arc::ptr_eq(&source_dirty, &copy_dirty));

        let source_clean = source.entry(clean).expect("tracked");
        let copy_clean = copy.entry(clean).expect("copied");
        assert!(!Arc::ptr_eq(&source_clean, &copy_clean));
    }

    #[test]
    fn isolated_copy_snapshots_every_entry() {
        let id = Uuid::new_v4();
        let mut source = DeltaStore::new();
        source.init(id);
        source.write(id, "born", json!(9), None);

        let mut copy = DeltaStore::new();
        copy.copy_from(&source, CloneMode::Isolated);
        source.write(id, "born", json!(10), None);

        assert_eq!(copy.pending_value(id, "born"), Some(json!(9)));
        assert_eq!(source.pending_value(id, "born"), Some(json!(10)));
    }
}
