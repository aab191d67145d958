//! Capability contracts shared across wrapped records.

pub mod methods;
