//! Infrastructure primitives for the event handler.
//!
//! Object naming, event kinds and phases, and the typed server configuration shared by
//! every layer of the stack.

pub mod config;
pub mod naming;
