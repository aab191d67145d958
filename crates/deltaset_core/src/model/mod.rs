//! Record and delta data model.
//!
//! # Responsibility
//! - Define the baseline record wrapped by a transaction context.
//! - Define the per-record delta of pending field replacements.
//!
//! # Invariants
//! - Every wrapped record is identified by a stable `RecordId`.
//! - A baseline changes only when its delta is committed.

pub mod delta;
pub mod record;
