//! Record domain model.
//!
//! # Responsibility
//! - Define the field bag wrapped by a transaction context.
//! - Own the system-assigned identity that keys per-record delta state.
//!
//! # Invariants
//! - `id` is generated once at wrap time and never reused for another record.
//! - The identity lives outside `fields`; `RESERVED_ID_FIELD` never appears
//!   as a field key.
//! - `fields` is mutated only by commit.

use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

/// Stable identifier for every wrapped record.
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type RecordId = Uuid;

/// Insertion-ordered field map used for baselines and deltas.
pub type Fields = Map<String, Value>;

/// Field name reserved for the system identity.
pub const RESERVED_ID_FIELD: &str = "id";

/// Baseline record: identity plus permanently stored field values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    /// Identity generated at wrap time.
    pub id: RecordId,
    /// Committed field values.
    pub fields: Fields,
}

impl Record {
    /// Wraps `fields` under a freshly generated identity.
    pub fn new(fields: Fields) -> Self {
        Self::with_id(Uuid::new_v4(), fields)
    }

    /// Wraps `fields` under a caller-provided identity.
    ///
    /// Used by clone paths where identity must stay index-aligned with the
    /// source context.
    pub fn with_id(id: RecordId, fields: Fields) -> Self {
        Self { id, fields }
    }

    /// Returns the stored value for `key`, if any.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Returns whether the baseline stores a field named `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }
}

/// Returns whether `fields` carries the reserved identity key.
pub fn has_reserved_field(fields: &Fields) -> bool {
    fields.contains_key(RESERVED_ID_FIELD)
}

/// Compares two field values the way the write rule needs.
///
/// Numbers are equal when they denote the same quantity (`2` and `2.0`);
/// arrays and objects compare element-wise with the same rule.
pub fn same_value(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) if l.is_f64() || r.is_f64() => {
            l.as_f64() == r.as_f64()
        }
        (Value::Array(l), Value::Array(r)) => {
            l.len() == r.len() && l.iter().zip(r).all(|(l, r)| same_value(l, r))
        }
        (Value::Object(l), Value::Object(r)) => {
            l.len() == r.len()
                && l
                    .iter()
                    .all(|(key, l)| r.get(key).is_some_and(|r| same_value(l, r)))
        }
        _ => left == right,
    }
}
