//! Object naming and event identification.
//!
//! This module defines the identifiers that flow through every layer of the event handler:
//!
//! **Object paths**: logical, absolute identifiers of data objects in the catalog
//! (e.g. `/tempZone/home/rods/file.txt`). Relative names given by a client are resolved
//! against a home collection before reaching the storage stack.
//!
//! **Event kinds**: the twelve canonical operation classes an event handler reacts to. Each
//! kind has exactly one uppercase tag string, which is what the tagging policy writes.
//!
//! **Phases**: the pre- or post-operation point at which a policy may fire.

use std::{
    fmt::{Debug, Display},
    str::FromStr,
};

use crate::event_handler::error::{ConfigurationError, EventHandlerError};

/// Logical identifier of a data object.
///
/// Always absolute, without empty, `.` or `..` segments and without a trailing slash.
#[derive(Debug, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ObjectPath(String);

impl ObjectPath {
    /// Validates an absolute logical path.
    pub fn new(path: &str) -> Result<Self, EventHandlerError> {
        let trimmed = path.strip_suffix('/').unwrap_or(path);
        if !trimmed.starts_with('/') || trimmed.len() < 2 {
            return Err(EventHandlerError::InvalidPath(path.to_string()));
        }
        if trimmed[1..].split('/').any(|segment| matches!(segment, "" | "." | "..")) {
            return Err(EventHandlerError::InvalidPath(path.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Resolves a client supplied name against a home collection.
    ///
    /// Absolute names are validated as is, relative names are joined to `home`.
    pub fn resolve(home: &str, name: &str) -> Result<Self, EventHandlerError> {
        if name.starts_with('/') {
            Self::new(name)
        } else {
            Self::new(&format!("{}/{}", home.trim_end_matches('/'), name))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last segment of the path.
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }

    /// Parent collection of the object.
    pub fn collection(&self) -> &str {
        match self.0.rfind('/') {
            Some(0) | None => "/",
            Some(index) => &self.0[..index],
        }
    }
}

impl Display for ObjectPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ObjectPath {
    type Err = EventHandlerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Canonical operation class of an intercepted storage action.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    Put,
    Get,
    Create,
    Read,
    Write,
    Rename,
    Registration,
    Replication,
    Checksum,
    Copy,
    Seek,
    Truncate,
}

impl EventKind {
    /// Every event kind, in configuration order.
    pub const ALL: [EventKind; 12] = [
        EventKind::Put,
        EventKind::Get,
        EventKind::Create,
        EventKind::Read,
        EventKind::Write,
        EventKind::Rename,
        EventKind::Registration,
        EventKind::Replication,
        EventKind::Checksum,
        EventKind::Copy,
        EventKind::Seek,
        EventKind::Truncate,
    ];

    /// Canonical tag string written by the tagging policy.
    pub fn tag(&self) -> &'static str {
        match self {
            EventKind::Put => "PUT",
            EventKind::Get => "GET",
            EventKind::Create => "CREATE",
            EventKind::Read => "READ",
            EventKind::Write => "WRITE",
            EventKind::Rename => "RENAME",
            EventKind::Registration => "REGISTRATION",
            EventKind::Replication => "REPLICATION",
            EventKind::Checksum => "CHECKSUM",
            EventKind::Copy => "COPY",
            EventKind::Seek => "SEEK",
            EventKind::Truncate => "TRUNCATE",
        }
    }
}

impl Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for EventKind {
    type Err = EventHandlerError;

    /// Parses a configuration event name, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.tag().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| EventHandlerError::UnrecognizedEvent(s.to_string()))
    }
}

/// Point of an operation at which a policy fires.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Phase {
    Pre,
    Post,
}

impl Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Pre => f.write_str("pre"),
            Phase::Post => f.write_str("post"),
        }
    }
}

impl FromStr for Phase {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pre" => Ok(Phase::Pre),
            "post" => Ok(Phase::Post),
            _ => Err(ConfigurationError::InvalidPhase(s.to_string())),
        }
    }
}

/// A discrete occurrence of one storage action, as seen by rule engine instances.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct OperationEvent {
    pub kind: EventKind,
    pub phase: Phase,
    /// One target, or two for a post-phase copy (source then destination).
    pub targets: Vec<ObjectPath>,
}

impl OperationEvent {
    pub fn new(kind: EventKind, phase: Phase, targets: Vec<ObjectPath>) -> Self {
        Self { kind, phase, targets }
    }
}
