//! Metadata service.
//!
//! Attaches, lists and removes attribute/value/unit triples on catalog objects. Adding
//! metadata to an object that does not exist is rejected with
//! [`EventHandlerError::MetadataWrite`], which is how a policy observes that its target
//! vanished (or does not exist yet, for pre-phase events).
//!
//! Duplicate triples are kept: an object touched twice by the same operation carries the
//! tag twice.

use std::{future::Future, pin::Pin, task::Poll};

use tower::Service;
use tracing::{debug, info};

use crate::event_handler::{
    api::types::{MetadataRequest, MetadataResponse},
    core::catalog::{Avu, Catalog},
    error::EventHandlerError,
    infrastructure::naming::ObjectPath,
};

#[derive(Debug, Clone, Default)]
pub struct MetadataService {
    catalog: Catalog,
}

impl MetadataService {
    pub fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }

    fn add(&self, path: ObjectPath, avu: Avu) -> Result<MetadataResponse, EventHandlerError> {
        self.catalog
            .with_object(&path, |object| {
                object.metadata.push(avu);
                Ok(())
            })
            .map_err(|_| EventHandlerError::MetadataWrite(path))?;
        Ok(MetadataResponse::Ack)
    }

    fn list(&self, path: &ObjectPath) -> Result<MetadataResponse, EventHandlerError> {
        self.catalog
            .with_object(path, |object| Ok(MetadataResponse::Metadata(object.metadata.clone())))
    }

    fn remove(&self, path: &ObjectPath, avu: &Avu) -> Result<MetadataResponse, EventHandlerError> {
        self.catalog.with_object(path, |object| {
            let before = object.metadata.len();
            object.metadata.retain(|existing| existing != avu);
            debug!("[metadata] removed {} entries from {}", before - object.metadata.len(), path);
            Ok(MetadataResponse::Ack)
        })
    }
}

impl Service<MetadataRequest> for MetadataService {
    type Response = MetadataResponse;
    type Error = EventHandlerError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _: &mut std::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: MetadataRequest) -> Self::Future {
        let this = self.clone();
        Box::pin(async move {
            match request {
                MetadataRequest::Add { path, avu } => {
                    info!("[metadata] Add: path: {}, avu: {:?}", path, avu);
                    this.add(path, avu)
                }
                MetadataRequest::List(path) => this.list(&path),
                MetadataRequest::Remove { path, avu } => {
                    info!("[metadata] Remove: path: {}, avu: {:?}", path, avu);
                    this.remove(&path, &avu)
                }
            }
        })
    }
}
