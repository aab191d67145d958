//! Core change-tracking engine for deltaset.
//! Records are wrapped in handles whose writes are buffered per record until
//! committed or rolled back.

pub mod audit;
pub mod capability;
pub mod events;
pub mod logging;
pub mod model;
pub mod store;
pub mod txn;

pub use audit::sink::{
    AuditEntry, AuditOperation, AuditSink, LogAuditSink, MemoryAuditSink, NoopAuditSink,
};
pub use capability::methods::{Method, MethodTable, SharedMethods};
pub use events::bus::{EventBus, Listener, ListenerError, ListenerResult};
pub use events::channel::EventChannel;
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::delta::Delta;
pub use model::record::{Fields, Record, RecordId, RESERVED_ID_FIELD};
pub use store::delta_store::{CloneMode, DeltaStore, WriteOutcome};
pub use txn::context::{TransactionContext, TransactionOptions};
pub use txn::error::{TransactionError, TransactionResult};
pub use txn::handle::{
    BoundMethod, BoundVerb, FieldDescriptor, FieldSource, RecordHandle, Resolved, Verb, VerbOutput,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
