//! Lifecycle event contracts.
//!
//! Channels are fixed at construction. There is no unsubscribe operation,
//! and `timeout` is declared without any producer.

pub mod bus;
pub mod channel;
