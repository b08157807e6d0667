//! Classification of storage requests into operation events.
//!
//! Every request maps to at most a few events, each carrying the object paths it affects
//! at that phase:
//!
//! - rename targets the source before the operation and the destination after it
//! - copy targets the source before, and both source and destination after
//! - a stream write to a missing object is a put
//! - a stream write to an existing object emits seek for a non-zero offset and truncate
//!   when truncation is requested, and only falls back to write when neither applies
//! - reads at a non-zero offset also emit seek
//!
//! Stat, remove and list never emit events.

use crate::event_handler::{
    api::types::StorageRequest,
    infrastructure::naming::{EventKind, ObjectPath, OperationEvent, Phase},
};

/// Whether classifying this request needs to know if its object existed beforehand.
pub fn needs_existence(request: &StorageRequest) -> bool {
    matches!(request, StorageRequest::StreamWrite { .. })
}

/// Events emitted by `request` at `phase`.
///
/// `existed` tells whether the request's object existed before the operation ran.
pub fn classify(request: &StorageRequest, phase: Phase, existed: bool) -> Vec<OperationEvent> {
    let single =
        |kind: EventKind, path: &ObjectPath| OperationEvent::new(kind, phase, vec![path.clone()]);
    match request {
        StorageRequest::Put { path, .. } => vec![single(EventKind::Put, path)],
        StorageRequest::Get(path) => vec![single(EventKind::Get, path)],
        StorageRequest::Create(path) => vec![single(EventKind::Create, path)],
        StorageRequest::Read { path, offset, .. } => {
            with_seek(single(EventKind::Read, path), *offset > 0, phase, path)
        }
        StorageRequest::Write { path, .. } => vec![single(EventKind::Write, path)],
        StorageRequest::StreamRead { path, offset, .. } => {
            with_seek(single(EventKind::Get, path), *offset > 0, phase, path)
        }
        StorageRequest::StreamWrite { path, offset, truncate, .. } => {
            if !existed {
                return vec![single(EventKind::Put, path)];
            }
            let mut events = Vec::new();
            if offset.is_some_and(|offset| offset > 0) {
                events.push(single(EventKind::Seek, path));
            }
            if *truncate {
                events.push(single(EventKind::Truncate, path));
            }
            if events.is_empty() {
                events.push(single(EventKind::Write, path));
            }
            events
        }
        StorageRequest::Truncate { path, .. } => vec![single(EventKind::Truncate, path)],
        StorageRequest::Rename { from, to } => match phase {
            Phase::Pre => vec![single(EventKind::Rename, from)],
            Phase::Post => vec![single(EventKind::Rename, to)],
        },
        StorageRequest::Copy { from, to } => match phase {
            Phase::Pre => vec![single(EventKind::Copy, from)],
            Phase::Post => {
                vec![OperationEvent::new(EventKind::Copy, phase, vec![from.clone(), to.clone()])]
            }
        },
        StorageRequest::Register { path, .. } => vec![single(EventKind::Registration, path)],
        StorageRequest::Replicate { path, .. } => vec![single(EventKind::Replication, path)],
        StorageRequest::Checksum(path) => vec![single(EventKind::Checksum, path)],
        StorageRequest::Remove(_) | StorageRequest::Stat(_) | StorageRequest::List => Vec::new(),
    }
}

fn with_seek(
    event: OperationEvent,
    seek: bool,
    phase: Phase,
    path: &ObjectPath,
) -> Vec<OperationEvent> {
    if seek {
        vec![event, OperationEvent::new(EventKind::Seek, phase, vec![path.clone()])]
    } else {
        vec![event]
    }
}
