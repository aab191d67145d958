//! CLI smoke entry point.
//!
//! # Responsibility
//! - Walk one record through write, delta, commit, clone and rollback.
//! - Print every audit entry as a block on stdout.
//!
//! # Configuration
//! - `DELTASET_LOG_DIR`: absolute directory; enables file logging when set.
//! - `DELTASET_LOG_LEVEL`: log level, defaults to the build-mode default.

use chrono::{DateTime, SecondsFormat};
use deltaset_core::{
    core_version, default_log_level, init_logging, AuditEntry, AuditSink, EventChannel, Fields,
    MethodTable, TransactionContext, TransactionOptions, TransactionResult,
};
use serde_json::{json, Value};
use std::process::ExitCode;
use std::sync::Arc;

const LOG_DIR_ENV: &str = "DELTASET_LOG_DIR";
const LOG_LEVEL_ENV: &str = "DELTASET_LOG_LEVEL";
const RULE: &str = "--------------";

/// Renders audit entries as human-readable blocks.
struct StdoutAuditSink;

impl AuditSink for StdoutAuditSink {
    fn record(&self, entry: &AuditEntry) {
        let delta = serde_json::to_string_pretty(&entry.delta)
            .unwrap_or_else(|_| entry.delta.to_json_string());
        println!("{RULE}");
        println!("ID: {}", entry.id);
        println!("TIME: {}", format_timestamp(entry.timestamp_ms));
        println!("OPERATION: {}", entry.operation);
        println!("DELTA: {delta}");
        println!("{RULE}");
    }
}

/// Renders epoch milliseconds as an RFC 3339 UTC time; raw millis when out
/// of range.
fn format_timestamp(timestamp_ms: i64) -> String {
    DateTime::from_timestamp_millis(timestamp_ms)
        .map(|time| time.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| timestamp_ms.to_string())
}

fn main() -> ExitCode {
    if let Ok(log_dir) = std::env::var(LOG_DIR_ENV) {
        let level = std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| default_log_level().to_string());
        if let Err(err) = init_logging(&level, &log_dir) {
            eprintln!("logging disabled: {err}");
        }
    }

    println!("deltaset_core version={}", core_version());
    match run_demo() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("event=demo_run module=cli status=error error={}", err);
            eprintln!("demo failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run_demo() -> TransactionResult<()> {
    let methods = MethodTable::new().with_method("getName", |this| {
        this.get("name").unwrap_or(Value::Null)
    });
    let options = TransactionOptions::default().with_audit_sink(Arc::new(StdoutAuditSink));
    let context = TransactionContext::with_options(demo_records(), Some(Arc::new(methods)), options)?;

    let dataset = context.dataset();
    let Some(first) = dataset.first() else {
        return Ok(());
    };

    first.set("born", 122);
    first.set("newField", "new Info");
    println!("keys: {}", first.keys().join(", "));
    println!("getName(): {}", first.call("getName").unwrap_or(Value::Null));
    first.delta()?;

    first.on(EventChannel::Commit, |target, delta| {
        println!("commit event for {}: merged {}", target.id, delta.to_json_string());
        Ok(())
    });
    first.commit()?;
    println!("after commit: {}", Value::Object(first.materialize()));

    first.set("born", 999);
    let cloned = first.clone_context()?;
    println!("clone holds {} records", cloned.len());

    first.on(EventChannel::Rollback, |target, delta| {
        println!("rollback event for {}: discarded {}", target.id, delta.to_json_string());
        Ok(())
    });
    first.rollback()?;
    println!("after rollback: {}", Value::Object(first.materialize()));
    first.delta()?;
    Ok(())
}

fn demo_records() -> Vec<Fields> {
    [
        json!({ "name": "Marcus Aurelius", "born": 121 }),
        json!({ "name": "Mark Hel", "born": 52 }),
        json!({ "name": "Tome Biri", "born": 45 }),
    ]
    .into_iter()
    .filter_map(|value| match value {
        Value::Object(fields) => Some(fields),
        _ => None,
    })
    .collect()
}
