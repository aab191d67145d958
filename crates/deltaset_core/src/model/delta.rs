//! Pending field changes for one record.

use crate::model::record::Fields;
use serde::Serialize;
use serde_json::Value;

/// Mapping from field name to a pending replacement value.
///
/// A key present here shadows the baseline value when read through a handle.
/// An empty delta means the record is clean.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Delta {
    changes: Fields,
}

impl Delta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.changes.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.changes.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.changes.insert(key.into(), value);
    }

    /// Drops the pending entry for `key`, keeping the order of the others.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.changes.shift_remove(key)
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.changes.keys()
    }

    /// Writes every pending entry onto `target`, in place.
    pub fn apply_to(&self, target: &mut Fields) {
        for (key, value) in &self.changes {
            target.insert(key.clone(), value.clone());
        }
    }

    /// Renders the snapshot as compact JSON for log lines.
    pub fn to_json_string(&self) -> String {
        Value::Object(self.changes.clone()).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::Delta;
    use crate::model::record::Fields;
    use serde_json::json;

    #[test]
    fn apply_to_overwrites_and_extends_target() {
        let mut delta = Delta::new();
        delta.insert("born", json!(2));
        delta.insert("title", json!("emperor"));

        let mut target = Fields::new();
        target.insert("name".to_string(), json!("A"));
        target.insert("born".to_string(), json!(1));
        delta.apply_to(&mut target);

        assert_eq!(target.get("born"), Some(&json!(2)));
        assert_eq!(target.get("title"), Some(&json!("emperor")));
        assert_eq!(target.get("name"), Some(&json!("A")));
    }

    #[test]
    fn remove_keeps_remaining_order() {
        let mut delta = Delta::new();
        delta.insert("a", json!(1));
        delta.insert("b", json!(2));
        delta.insert("c", json!(3));

        assert_eq!(delta.remove("b"), Some(json!(2)));
        let keys: Vec<&String> = delta.keys().collect();
        assert_eq!(keys, ["a", "c"]);
    }

    #[test]
    fn serializes_as_plain_object() {
        let mut delta = Delta::new();
        delta.insert("born", json!(5));
        assert_eq!(delta.to_json_string(), r#"{"born":5}"#);
        assert_eq!(
            serde_json::to_value(&delta).expect("delta serializes"),
            json!({ "born": 5 })
        );
    }
}
