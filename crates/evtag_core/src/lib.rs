//! # evtag core
//!
//! Event-tagging policy engine for a data-management server. Object-level operations
//! (put, get, rename, copy, checksum, streaming writes, ...) are intercepted by a tower
//! middleware, classified into canonical event kinds, and dispatched through an ordered
//! chain of rule engine instances. Event handler instances invoke the configured policy,
//! which records the event as a metadata tag on the affected objects.
//!
//! See [`event_handler`] for the module map and [`event_handler::init_event_handler`] for
//! the usual way to assemble a stack from a server configuration.

pub mod event_handler;
pub mod logging;
