//! Pending-change storage owned by one transaction context.

pub mod delta_store;
