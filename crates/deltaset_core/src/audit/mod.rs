//! Audit trail for transaction verbs.
//!
//! The core only produces entries; rendering them for an operator belongs to
//! whichever `AuditSink` the context was built with.

pub mod sink;
