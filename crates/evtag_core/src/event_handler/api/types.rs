//! Event handler API type definitions.
//!
//! Request and response types exchanged between the layers of the stack:
//!
//! ## Storage API
//! Object-level operations issued by clients. Served by the storage backend and intercepted
//! by the event handler middleware, which derives operation events from them.
//!
//! ## Rule Engine API
//! Operation events dispatched through the ordered chain of rule engine instances.
//!
//! ## Policy API
//! Invocation of a named policy for one event target.
//!
//! ## Metadata and Inspect APIs
//! Metadata writes performed by policies, and the read-back interface used by operators.

use serde_json::Value;

use crate::event_handler::{
    core::catalog::{Avu, ObjectStat},
    infrastructure::naming::{ObjectPath, OperationEvent},
};

/// Object-level storage operations.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum StorageRequest {
    /// Upload a whole object. Without `force`, an existing object is not overwritten.
    Put { path: ObjectPath, data: Vec<u8>, force: bool },

    /// Download a whole object.
    Get(ObjectPath),

    /// Create an empty object.
    Create(ObjectPath),

    /// Read `count` bytes (or up to the end) starting at `offset`.
    Read { path: ObjectPath, offset: u64, count: Option<u64> },

    /// Replace the content of an existing object.
    Write { path: ObjectPath, data: Vec<u8> },

    /// Streaming read, as performed by a stream client.
    StreamRead { path: ObjectPath, offset: u64, count: Option<u64> },

    /// Streaming write. Creates the object when missing, otherwise writes at `offset`
    /// and, when `truncate` is set, cuts the object right after the written bytes.
    StreamWrite { path: ObjectPath, data: Vec<u8>, offset: Option<u64>, truncate: bool },

    /// Set the size of an existing object, zero-filling when growing.
    Truncate { path: ObjectPath, size: u64 },

    /// Move an object to a path that does not exist yet.
    Rename { from: ObjectPath, to: ObjectPath },

    /// Copy an object to a path that does not exist yet.
    Copy { from: ObjectPath, to: ObjectPath },

    /// Register existing content as a new object.
    Register { path: ObjectPath, data: Vec<u8> },

    /// Add a replica of an object on another resource.
    Replicate { path: ObjectPath, resource: String },

    /// Compute and store the checksum of an object.
    Checksum(ObjectPath),

    /// Remove an object and its metadata.
    Remove(ObjectPath),

    Stat(ObjectPath),

    List,
}

impl StorageRequest {
    /// Object the request primarily operates on, if any.
    pub fn path(&self) -> Option<&ObjectPath> {
        match self {
            StorageRequest::Put { path, .. }
            | StorageRequest::Get(path)
            | StorageRequest::Create(path)
            | StorageRequest::Read { path, .. }
            | StorageRequest::Write { path, .. }
            | StorageRequest::StreamRead { path, .. }
            | StorageRequest::StreamWrite { path, .. }
            | StorageRequest::Truncate { path, .. }
            | StorageRequest::Register { path, .. }
            | StorageRequest::Replicate { path, .. }
            | StorageRequest::Checksum(path)
            | StorageRequest::Remove(path)
            | StorageRequest::Stat(path) => Some(path),
            StorageRequest::Rename { from, .. } | StorageRequest::Copy { from, .. } => Some(from),
            StorageRequest::List => None,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum StorageResponse {
    Ack,
    Data(Vec<u8>),
    Checksum(String),
    Stat(Option<ObjectStat>),
    Paths(Vec<ObjectPath>),
}

/// Requests dispatched through the rule engine chain.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum RuleEngineRequest {
    Event(OperationEvent),
}

/// Outcome of one rule engine instance for one event.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct HandlerReport {
    /// Policy invocations attempted.
    pub invoked: usize,
    /// Invocations that applied their effect.
    pub applied: usize,
    /// Invocations that failed, already logged.
    pub failed: usize,
}

impl HandlerReport {
    pub fn merge(&mut self, other: HandlerReport) {
        self.invoked += other.invoked;
        self.applied += other.applied;
        self.failed += other.failed;
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RuleEngineResponse {
    /// Pass the event on to the next instance.
    Continue(HandlerReport),
    /// Stop evaluating the rest of the chain.
    Stop(HandlerReport),
}

/// Invocation of a named policy for a single target of an event.
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyRequest {
    Invoke { event: OperationEvent, target: ObjectPath, configuration: Value },
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum PolicyResponse {
    Applied,
    Skipped,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum MetadataRequest {
    Add { path: ObjectPath, avu: Avu },
    List(ObjectPath),
    Remove { path: ObjectPath, avu: Avu },
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum MetadataResponse {
    Ack,
    Metadata(Vec<Avu>),
}

/// Operator-facing metadata read-back.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum InspectRequest {
    /// All metadata of an object, in unspecified order.
    ListMetadata(ObjectPath),
    /// Whether any metadata value of the object equals `tag`.
    HasTag { path: ObjectPath, tag: String },
    /// Remove one metadata triple, as an external actor would.
    RemoveMetadata { path: ObjectPath, avu: Avu },
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum InspectResponse {
    Metadata(Vec<Avu>),
    HasTag(bool),
    Ack,
}
