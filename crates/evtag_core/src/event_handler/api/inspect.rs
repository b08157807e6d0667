//! Inspect API service.
//!
//! Read-back interface over object metadata for operators and test harnesses: list the
//! triples attached to an object, check whether a tag value is present, and remove a
//! triple the way an external actor would. Requests go straight to the metadata service
//! and never produce operation events.

use std::{future::Future, pin::Pin, task::Poll};

use tower::{Service, ServiceExt};
use tracing::info;

use crate::event_handler::{
    api::types::{InspectRequest, InspectResponse, MetadataRequest, MetadataResponse},
    error::EventHandlerError,
};

/// Inspect API service over a metadata service.
#[derive(Debug, Clone)]
pub struct InspectApiService<M> {
    metadata: M,
}

impl<M> InspectApiService<M> {
    pub fn new(metadata: M) -> Self {
        Self { metadata }
    }
}

impl<M> Service<InspectRequest> for InspectApiService<M>
where
    M: Service<MetadataRequest, Response = MetadataResponse, Error = EventHandlerError>
        + Clone
        + Send
        + 'static,
    M::Future: Send,
{
    type Response = InspectResponse;
    type Error = EventHandlerError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _: &mut std::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: InspectRequest) -> Self::Future {
        let mut metadata = self.metadata.clone();
        Box::pin(async move {
            match request {
                InspectRequest::ListMetadata(path) => {
                    match metadata.ready().await?.call(MetadataRequest::List(path)).await? {
                        MetadataResponse::Metadata(avus) => Ok(InspectResponse::Metadata(avus)),
                        _ => Err(EventHandlerError::InternalEventHandlerError),
                    }
                }
                InspectRequest::HasTag { path, tag } => {
                    match metadata.ready().await?.call(MetadataRequest::List(path)).await? {
                        MetadataResponse::Metadata(avus) => {
                            Ok(InspectResponse::HasTag(avus.iter().any(|avu| avu.value == tag)))
                        }
                        _ => Err(EventHandlerError::InternalEventHandlerError),
                    }
                }
                InspectRequest::RemoveMetadata { path, avu } => {
                    info!("[inspect] RemoveMetadata: path: {}, avu: {:?}", path, avu);
                    let request = MetadataRequest::Remove { path, avu };
                    match metadata.ready().await?.call(request).await? {
                        MetadataResponse::Ack => Ok(InspectResponse::Ack),
                        _ => Err(EventHandlerError::InternalEventHandlerError),
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_handler::{
        core::catalog::{Avu, Catalog, DataObject},
        infrastructure::naming::ObjectPath,
        services::metadata::MetadataService,
    };

    #[tokio::test]
    async fn unit_inspect_api_tags() {
        crate::logging::init();
        let catalog = Catalog::default();
        let f = ObjectPath::new("/z/f").unwrap();
        catalog.insert_new(f.clone(), DataObject::new(Vec::new(), "demoResc")).unwrap();
        let mut metadata = MetadataService::new(catalog);
        metadata
            .call(MetadataRequest::Add { path: f.clone(), avu: Avu::new("a", "PUT") })
            .await
            .unwrap();
        let mut inspect = InspectApiService::new(metadata);

        let has_tag = |tag: &str| InspectRequest::HasTag { path: f.clone(), tag: tag.into() };
        assert_eq!(inspect.call(has_tag("PUT")).await.unwrap(), InspectResponse::HasTag(true));
        assert_eq!(inspect.call(has_tag("put")).await.unwrap(), InspectResponse::HasTag(false));
        assert_eq!(
            inspect
                .call(InspectRequest::RemoveMetadata { path: f.clone(), avu: Avu::new("a", "PUT") })
                .await
                .unwrap(),
            InspectResponse::Ack
        );
        assert_eq!(
            inspect.call(InspectRequest::ListMetadata(f)).await.unwrap(),
            InspectResponse::Metadata(Vec::new())
        );
    }

    #[tokio::test]
    async fn unit_inspect_api_missing_object() {
        let missing = ObjectPath::new("/z/missing").unwrap();
        let mut inspect = InspectApiService::new(MetadataService::default());
        assert_eq!(
            inspect.call(InspectRequest::ListMetadata(missing.clone())).await.unwrap_err(),
            EventHandlerError::ObjectNotFound(missing)
        );
    }
}
