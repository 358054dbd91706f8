//! In-process fan-out of messages to connected subscribers.
//!
//! - [`ConnectionHub`]: a set of subscriber channels keyed by connection id,
//!   with best-effort broadcast and pruning of closed subscribers.

pub mod hub;

pub use hub::ConnectionHub;
