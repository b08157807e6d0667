//! # Storage Module
//!
//! In-memory storage backend serving object-level operations over the shared [`Catalog`].
//!
//! The backend knows nothing about events or policies: it is the service the event handler
//! middleware wraps. Every content change invalidates the stored checksum; checksums are
//! SHA-256 digests encoded as `sha2:<base64>`.

use std::{future::Future, pin::Pin, task::Poll};

use base64::{Engine, engine::general_purpose::STANDARD};
use sha2::{Digest, Sha256};
use tower::Service;
use tracing::info;

use crate::event_handler::{
    api::types::{StorageRequest, StorageResponse},
    core::catalog::{Catalog, DataObject},
    error::EventHandlerError,
    infrastructure::naming::ObjectPath,
};

/// Resource receiving new objects unless configured otherwise.
pub const DEFAULT_RESOURCE: &str = "demoResc";

/// Largest object size, in bytes, a write or truncate may produce.
pub const MAX_OBJECT_SIZE: u64 = 1 << 30;

/// End of a write of `len` bytes at `offset`, checked against [`MAX_OBJECT_SIZE`].
fn write_end(path: &ObjectPath, offset: u64, len: usize) -> Result<usize, EventHandlerError> {
    u64::try_from(len)
        .ok()
        .and_then(|len| offset.checked_add(len))
        .filter(|end| *end <= MAX_OBJECT_SIZE)
        .and_then(|end| usize::try_from(end).ok())
        .ok_or_else(|| EventHandlerError::InvalidRange(path.clone(), offset))
}

/// Storage backend service.
///
/// Cheap to clone, clones share the same catalog.
#[derive(Debug, Clone)]
pub struct StorageService {
    catalog: Catalog,
    /// Resource new objects are created on
    resource: String,
}

impl Default for StorageService {
    fn default() -> Self {
        Self::new(Catalog::default())
    }
}

impl StorageService {
    pub fn new(catalog: Catalog) -> Self {
        Self { catalog, resource: DEFAULT_RESOURCE.to_string() }
    }

    pub fn with_resource(self, resource: impl Into<String>) -> Self {
        Self { resource: resource.into(), ..self }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn new_object(&self, data: Vec<u8>) -> DataObject {
        DataObject::new(data, &self.resource)
    }

    fn put(
        &self,
        path: ObjectPath,
        data: Vec<u8>,
        force: bool,
    ) -> Result<StorageResponse, EventHandlerError> {
        if force && self.catalog.contains(&path) {
            self.catalog.with_object(&path, |object| {
                object.data = data;
                object.touch();
                Ok(())
            })?;
        } else {
            self.catalog.insert_new(path, self.new_object(data))?;
        }
        Ok(StorageResponse::Ack)
    }

    fn read(
        &self,
        path: &ObjectPath,
        offset: u64,
        count: Option<u64>,
    ) -> Result<StorageResponse, EventHandlerError> {
        self.catalog.with_object(path, |object| {
            let len = object.data.len();
            let start = usize::try_from(offset).map_or(len, |offset| offset.min(len));
            let end = match count {
                Some(count) => {
                    start.saturating_add(usize::try_from(count).unwrap_or(usize::MAX)).min(len)
                }
                None => len,
            };
            Ok(StorageResponse::Data(object.data[start..end].to_vec()))
        })
    }

    fn stream_write(
        &self,
        path: ObjectPath,
        data: Vec<u8>,
        offset: Option<u64>,
        truncate: bool,
    ) -> Result<StorageResponse, EventHandlerError> {
        let offset = offset.unwrap_or(0);
        let end = write_end(&path, offset, data.len())?;
        let start = end - data.len();
        if !self.catalog.contains(&path) {
            let mut content = vec![0; start];
            content.extend_from_slice(&data);
            self.catalog.insert_new(path, self.new_object(content))?;
            return Ok(StorageResponse::Ack);
        }
        self.catalog.with_object(&path, |object| {
            if object.data.len() < end {
                object.data.resize(end, 0);
            }
            object.data[start..end].copy_from_slice(&data);
            if truncate {
                object.data.truncate(end);
            }
            object.touch();
            Ok(StorageResponse::Ack)
        })
    }

    fn checksum(&self, path: &ObjectPath) -> Result<StorageResponse, EventHandlerError> {
        self.catalog.with_object(path, |object| {
            let checksum = format!("sha2:{}", STANDARD.encode(Sha256::digest(&object.data)));
            object.checksum = Some(checksum.clone());
            Ok(StorageResponse::Checksum(checksum))
        })
    }

    fn replicate(
        &self,
        path: &ObjectPath,
        resource: String,
    ) -> Result<StorageResponse, EventHandlerError> {
        self.catalog.with_object(path, |object| {
            if object.replicas.contains(&resource) {
                return Err(EventHandlerError::ReplicaExists(path.clone(), resource));
            }
            object.replicas.push(resource);
            Ok(StorageResponse::Ack)
        })
    }

    fn handle(&self, request: StorageRequest) -> Result<StorageResponse, EventHandlerError> {
        match request {
            StorageRequest::Put { path, data, force } => self.put(path, data, force),
            StorageRequest::Get(path) => self.read(&path, 0, None),
            StorageRequest::Create(path) => {
                self.catalog.insert_new(path, self.new_object(Vec::new()))?;
                Ok(StorageResponse::Ack)
            }
            StorageRequest::Read { path, offset, count }
            | StorageRequest::StreamRead { path, offset, count } => self.read(&path, offset, count),
            StorageRequest::Write { path, data } => self.catalog.with_object(&path, |object| {
                object.data = data;
                object.touch();
                Ok(StorageResponse::Ack)
            }),
            StorageRequest::StreamWrite { path, data, offset, truncate } => {
                self.stream_write(path, data, offset, truncate)
            }
            StorageRequest::Truncate { path, size } => {
                let size = write_end(&path, size, 0)?;
                self.catalog.with_object(&path, |object| {
                    object.data.resize(size, 0);
                    object.touch();
                    Ok(StorageResponse::Ack)
                })
            }
            StorageRequest::Rename { from, to } => {
                self.catalog.rename(&from, &to)?;
                Ok(StorageResponse::Ack)
            }
            StorageRequest::Copy { from, to } => {
                self.catalog.copy(&from, &to)?;
                Ok(StorageResponse::Ack)
            }
            StorageRequest::Register { path, data } => {
                self.catalog.insert_new(path, self.new_object(data))?;
                Ok(StorageResponse::Ack)
            }
            StorageRequest::Replicate { path, resource } => self.replicate(&path, resource),
            StorageRequest::Checksum(path) => self.checksum(&path),
            StorageRequest::Remove(path) => {
                self.catalog.remove(&path)?;
                Ok(StorageResponse::Ack)
            }
            StorageRequest::Stat(path) => Ok(StorageResponse::Stat(self.catalog.stat(&path))),
            StorageRequest::List => Ok(StorageResponse::Paths(self.catalog.paths())),
        }
    }
}

impl Service<StorageRequest> for StorageService {
    type Response = StorageResponse;
    type Error = EventHandlerError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _: &mut std::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: StorageRequest) -> Self::Future {
        let this = self.clone();
        Box::pin(async move {
            info!("[storage-{}] {:?}", this.resource, request.path());
            this.handle(request)
        })
    }
}
