//! Shared object catalog.
//!
//! The catalog is the single source of truth for data objects and their attached metadata.
//! Storage and metadata services hold clones of the same `Catalog`, so a tag written by a
//! policy is immediately visible to inspection, follows the object across a rename and
//! disappears with it on removal.
//!
//! Each object lives in its own `DashMap` entry: concurrent operations on distinct objects
//! never contend, and operations on the same object serialize on the entry lock. A rename
//! spans two entries and is not atomic: the object is absent from both paths while it
//! moves.

use std::{sync::Arc, time::SystemTime};

use dashmap::{DashMap, Entry};
use tracing::warn;

use crate::event_handler::{error::EventHandlerError, infrastructure::naming::ObjectPath};

/// Attribute/value/unit metadata triple attached to an object.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Avu {
    pub attribute: String,
    pub value: String,
    pub unit: String,
}

impl Avu {
    pub fn new(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self { attribute: attribute.into(), value: value.into(), unit: String::new() }
    }

    pub fn with_unit(self, unit: impl Into<String>) -> Self {
        Self { unit: unit.into(), ..self }
    }
}

#[derive(Debug, Clone)]
pub struct DataObject {
    pub data: Vec<u8>,
    pub checksum: Option<String>,
    /// Resources holding a replica, the first one being where the object was created.
    pub replicas: Vec<String>,
    pub metadata: Vec<Avu>,
    pub modified: SystemTime,
}

impl DataObject {
    pub fn new(data: Vec<u8>, resource: &str) -> Self {
        Self {
            data,
            checksum: None,
            replicas: vec![resource.to_string()],
            metadata: Vec::new(),
            modified: SystemTime::now(),
        }
    }

    /// Marks the content as modified, invalidating any stored checksum.
    pub fn touch(&mut self) {
        self.checksum = None;
        self.modified = SystemTime::now();
    }
}

/// Summary of an object, as returned by a stat request.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ObjectStat {
    pub size: u64,
    pub checksum: Option<String>,
    pub replicas: Vec<String>,
}

impl From<&DataObject> for ObjectStat {
    fn from(object: &DataObject) -> Self {
        Self {
            size: object.data.len() as u64,
            checksum: object.checksum.clone(),
            replicas: object.replicas.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    objects: Arc<DashMap<ObjectPath, DataObject>>,
}

impl Catalog {
    pub fn contains(&self, path: &ObjectPath) -> bool {
        self.objects.contains_key(path)
    }

    pub fn stat(&self, path: &ObjectPath) -> Option<ObjectStat> {
        self.objects.get(path).map(|object| ObjectStat::from(object.value()))
    }

    /// Inserts a new object, refusing to replace an existing one.
    pub fn insert_new(
        &self,
        path: ObjectPath,
        object: DataObject,
    ) -> Result<(), EventHandlerError> {
        match self.objects.entry(path) {
            Entry::Occupied(occupied) => {
                Err(EventHandlerError::ObjectAlreadyExists(occupied.key().clone()))
            }
            Entry::Vacant(vacant) => {
                vacant.insert(object);
                Ok(())
            }
        }
    }

    /// Runs `f` on an existing object while holding its entry lock.
    pub fn with_object<R>(
        &self,
        path: &ObjectPath,
        f: impl FnOnce(&mut DataObject) -> Result<R, EventHandlerError>,
    ) -> Result<R, EventHandlerError> {
        match self.objects.get_mut(path) {
            Some(mut object) => f(object.value_mut()),
            None => Err(EventHandlerError::ObjectNotFound(path.clone())),
        }
    }

    pub fn remove(&self, path: &ObjectPath) -> Result<DataObject, EventHandlerError> {
        self.objects
            .remove(path)
            .map(|(_, object)| object)
            .ok_or_else(|| EventHandlerError::ObjectNotFound(path.clone()))
    }

    /// Moves an object, with its metadata, to a new path that must not exist yet.
    pub fn rename(&self, from: &ObjectPath, to: &ObjectPath) -> Result<(), EventHandlerError> {
        if self.contains(to) {
            return Err(EventHandlerError::ObjectAlreadyExists(to.clone()));
        }
        let object = self.remove(from)?;
        let rejected = match self.objects.entry(to.clone()) {
            Entry::Occupied(_) => Some(object),
            Entry::Vacant(vacant) => {
                vacant.insert(object);
                None
            }
        };
        match rejected {
            // Destination appeared concurrently
            Some(object) => {
                if !self.restore(from, object) {
                    warn!("[catalog] {} recreated during rename, moved object dropped", from);
                }
                Err(EventHandlerError::ObjectAlreadyExists(to.clone()))
            }
            None => Ok(()),
        }
    }

    /// Puts a displaced object back at `from`, unless another writer has taken the path.
    fn restore(&self, from: &ObjectPath, object: DataObject) -> bool {
        match self.objects.entry(from.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(object);
                true
            }
        }
    }

    /// Copies content and replicas of an object. Metadata is not copied.
    pub fn copy(&self, from: &ObjectPath, to: &ObjectPath) -> Result<(), EventHandlerError> {
        let copy = match self.objects.get(from) {
            Some(source) => DataObject {
                data: source.data.clone(),
                checksum: source.checksum.clone(),
                replicas: source.replicas.iter().take(1).cloned().collect(),
                metadata: Vec::new(),
                modified: SystemTime::now(),
            },
            None => return Err(EventHandlerError::ObjectNotFound(from.clone())),
        };
        self.insert_new(to.clone(), copy)
    }

    pub fn paths(&self) -> Vec<ObjectPath> {
        let mut paths: Vec<_> = self.objects.iter().map(|entry| entry.key().clone()).collect();
        paths.sort();
        paths
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
