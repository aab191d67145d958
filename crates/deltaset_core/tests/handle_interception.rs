use deltaset_core::{
    FieldSource, Fields, MethodTable, NoopAuditSink, Resolved, SharedMethods, TransactionContext,
    TransactionOptions,
};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;

fn records(value: Value) -> Vec<Fields> {
    value
        .as_array()
        .expect("array literal")
        .iter()
        .map(|item| item.as_object().cloned().expect("object literal"))
        .collect()
}

fn quiet_context(value: Value, methods: Option<Arc<dyn SharedMethods>>) -> TransactionContext {
    let options = TransactionOptions::default().with_audit_sink(Arc::new(NoopAuditSink));
    TransactionContext::with_options(records(value), methods, options).expect("context builds")
}

#[test]
fn freshly_wrapped_records_are_clean() {
    let ctx = quiet_context(
        json!([{ "name": "A", "born": 1 }, { "name": "B", "born": 2 }]),
        None,
    );

    let dataset = ctx.dataset();
    assert_eq!(dataset.len(), 2);
    for (handle, expected) in dataset.iter().zip(["A", "B"]) {
        assert!(handle.delta().expect("delta").is_empty());
        assert!(!handle.is_dirty());
        assert_eq!(handle.get("name"), Some(json!(expected)));
    }
    assert_ne!(dataset[0].id(), dataset[1].id());
}

#[test]
fn write_shadows_baseline_without_touching_it() {
    let ctx = quiet_context(json!([{ "name": "A", "born": 1 }]), None);
    let handle = ctx.handle(0).expect("handle");

    handle.set("born", 2);

    assert_eq!(handle.get("born"), Some(json!(2)));
    assert_eq!(handle.delta().expect("delta").get("born"), Some(&json!(2)));
    assert_eq!(handle.baseline().get("born"), Some(&json!(1)));
    assert!(matches!(handle.resolve("born"), Resolved::Pending(_)));
}

#[test]
fn writing_baseline_value_collapses_pending_entry() {
    let ctx = quiet_context(json!([{ "name": "A", "born": 1 }]), None);
    let handle = ctx.handle(0).expect("handle");

    handle.set("born", 7);
    handle.set("born", 8);
    handle.set("born", 1);

    assert!(!handle.delta().expect("delta").contains("born"));
    assert!(!handle.is_dirty());
    assert!(matches!(handle.resolve("born"), Resolved::Stored(_)));

    handle.set("name", "A");
    assert!(handle.delta().expect("delta").is_empty());
}

#[test]
fn numerically_equal_write_collapses_pending_entry() {
    let ctx = quiet_context(json!([{ "name": "A", "born": 2 }]), None);
    let handle = ctx.handle(0).expect("handle");

    handle.set("born", 2.0);
    assert!(handle.delta().expect("delta").is_empty());
    assert_eq!(handle.get("born"), Some(json!(2)));

    handle.set("born", 3);
    handle.set("born", 2.0);
    assert!(!handle.is_dirty());

    handle.set("born", 2.5);
    assert_eq!(handle.delta().expect("delta").get("born"), Some(&json!(2.5)));
}

#[test]
fn new_fields_are_pending_until_commit() {
    let ctx = quiet_context(json!([{ "name": "A" }]), None);
    let handle = ctx.handle(0).expect("handle");

    handle.set("title", "emperor");

    assert_eq!(handle.get("title"), Some(json!("emperor")));
    assert!(!handle.baseline().contains("title"));
    let described = handle.describe("title").expect("pending field described");
    assert_eq!(described.source, FieldSource::Pending);
}

#[test]
fn enumeration_is_union_of_baseline_and_pending_keys() {
    let ctx = quiet_context(json!([{ "name": "A", "born": 1 }]), None);
    let handle = ctx.handle(0).expect("handle");

    handle.set("born", 3);
    handle.set("newField", "new Info");
    handle.set("id", "ignored");

    let keys = handle.keys();
    assert_eq!(keys, vec!["name", "born", "newField"]);
    let unique: HashSet<&String> = keys.iter().collect();
    assert_eq!(unique.len(), keys.len());
}

#[test]
fn missing_field_reads_as_none() {
    let ctx = quiet_context(json!([{ "name": "A" }]), None);
    let handle = ctx.handle(0).expect("handle");
    assert_eq!(handle.get("unknown"), None);
    assert!(handle.resolve("unknown").is_absent());
}

#[test]
fn shared_methods_resolve_after_fields_and_see_pending_values() {
    let methods = MethodTable::new()
        .with_method("getName", |this| this.get("name").unwrap_or(Value::Null))
        .with_method("born", |_| json!("method"));
    let ctx = quiet_context(
        json!([{ "name": "Marcus", "born": 121 }]),
        Some(Arc::new(methods)),
    );
    let handle = ctx.handle(0).expect("handle");

    assert_eq!(handle.call("getName"), Some(json!("Marcus")));
    handle.set("name", "Aurelius");
    assert_eq!(handle.call("getName"), Some(json!("Aurelius")));

    assert_eq!(handle.get("born"), Some(json!(121)));
    assert_eq!(handle.call("born"), None);
    assert!(matches!(handle.resolve("getName"), Resolved::Method(_)));
    assert!(!handle.keys().contains(&"getName".to_string()));
}

#[test]
fn handles_keep_dataset_order_and_resolve_by_id() {
    let ctx = quiet_context(json!([{ "n": 0 }, { "n": 1 }, { "n": 2 }]), None);

    for (index, id) in ctx.ids().into_iter().enumerate() {
        let handle = ctx.handle_by_id(id).expect("handle by id");
        assert_eq!(handle.get("n"), Some(json!(index)));
    }
    assert!(ctx.handle(3).is_none());
}
