//! Shared domain types for the BlackRoad agent streaming core.
//!
//! Pure logic only: no database, network or process access lives here.

pub mod error;
pub mod stream_events;
pub mod text;
pub mod types;
pub mod validation;
