//! Transaction context, record handles and their verbs.
//!
//! # Responsibility
//! - Present wrapped records through `RecordHandle` interception.
//! - Run commit/rollback/delta/clone per record identity.
//!
//! # Invariants
//! - Each record's delta commits or rolls back independently.
//! - Verbs invoked through a handle always target that handle's identity.

pub mod context;
pub mod error;
pub mod handle;
