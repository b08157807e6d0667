//! Services composing the event handler stack.
//!
//! - **Storage**: in-memory backend serving object operations
//! - **Metadata**: attribute/value/unit triples attached to objects
//! - **Policy**: policy dispatch table and the tagging policy
//! - **Handler**: a configured event handler rule engine instance
//! - **Chain**: ordered list of rule engine instances

pub mod chain;
pub mod handler;
pub mod metadata;
pub mod policy;
pub mod storage;
