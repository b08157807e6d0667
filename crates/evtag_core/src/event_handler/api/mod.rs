//! External-facing APIs of the event handler.
//!
//! - **Storage**: the tower middleware intercepting object operations and emitting
//!   operation events to the rule engine chain
//! - **Inspect**: metadata read-back for operators and test tooling

pub mod inspect;
pub mod storage;
pub mod types;

// Re-export all types for convenience
pub use types::*;
