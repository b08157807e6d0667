//! Storage API middleware.
//!
//! [`EventHandlerMiddleware`] wraps a storage backend and turns every object operation
//! into operation events for the rule engine chain:
//!
//! 1. when classification depends on it, stat the target to learn whether it exists
//! 2. dispatch the pre-operation events
//! 3. run the operation on the backend
//! 4. on success, dispatch the post-operation events
//!
//! The backend's result is returned unchanged. Rule engine failures are logged and never
//! fail or roll back the operation: tagging is observational.

use std::{future::Future, pin::Pin, task::Poll};

use tower::{Layer, Service, ServiceExt};
use tracing::{debug, warn};

use crate::event_handler::{
    api::types::{RuleEngineRequest, StorageRequest, StorageResponse},
    core::classifier::{classify, needs_existence},
    error::EventHandlerError,
    infrastructure::naming::{OperationEvent, Phase},
    services::chain::ChainReport,
};

/// Storage middleware emitting operation events to a rule engine chain.
#[derive(Debug, Clone)]
pub struct EventHandlerMiddleware<S, R> {
    /// Storage backend
    inner: S,
    /// Rule engine chain receiving the events
    rule_engines: R,
}

impl<S, R> EventHandlerMiddleware<S, R> {
    pub fn new(inner: S, rule_engines: R) -> Self {
        Self { inner, rule_engines }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

/// Layer wrapping a storage backend in an [`EventHandlerMiddleware`].
#[derive(Debug, Clone)]
pub struct EventHandlerLayer<R> {
    rule_engines: R,
}

impl<R> EventHandlerLayer<R> {
    pub fn new(rule_engines: R) -> Self {
        Self { rule_engines }
    }
}

impl<S, R: Clone> Layer<S> for EventHandlerLayer<R> {
    type Service = EventHandlerMiddleware<S, R>;

    fn layer(&self, inner: S) -> Self::Service {
        EventHandlerMiddleware::new(inner, self.rule_engines.clone())
    }
}

async fn dispatch<R>(rule_engines: &mut R, events: Vec<OperationEvent>)
where
    R: Service<RuleEngineRequest, Response = ChainReport, Error = EventHandlerError>,
{
    for event in events {
        let (kind, phase) = (event.kind, event.phase);
        match rule_engines.ready().await {
            Ok(chain) => match chain.call(RuleEngineRequest::Event(event)).await {
                Ok(report) => debug!("[storage-api] {} {}: {:?}", phase, kind, report),
                Err(e) => warn!("[storage-api] {} {} not handled: {}", phase, kind, e),
            },
            Err(e) => warn!("[storage-api] {} {} not handled: {}", phase, kind, e),
        }
    }
}

impl<S, R> Service<StorageRequest> for EventHandlerMiddleware<S, R>
where
    S: Service<StorageRequest, Response = StorageResponse, Error = EventHandlerError>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
    R: Service<RuleEngineRequest, Response = ChainReport, Error = EventHandlerError>
        + Clone
        + Send
        + 'static,
    R::Future: Send,
{
    type Response = StorageResponse;
    type Error = EventHandlerError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _: &mut std::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: StorageRequest) -> Self::Future {
        let mut inner = self.inner.clone();
        let mut rule_engines = self.rule_engines.clone();
        Box::pin(async move {
            let existed = match request.path() {
                Some(path) if needs_existence(&request) => {
                    match inner.ready().await?.call(StorageRequest::Stat(path.clone())).await? {
                        StorageResponse::Stat(stat) => stat.is_some(),
                        _ => return Err(EventHandlerError::InternalEventHandlerError),
                    }
                }
                _ => true,
            };

            dispatch(&mut rule_engines, classify(&request, Phase::Pre, existed)).await;
            let post_events = classify(&request, Phase::Post, existed);
            let response = inner.ready().await?.call(request).await?;
            dispatch(&mut rule_engines, post_events).await;
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::event_handler::{
        infrastructure::naming::{EventKind, ObjectPath},
        services::storage::StorageService,
    };

    /// Chain recording the events it receives.
    #[derive(Clone, Default)]
    struct RecordingChain(Arc<Mutex<Vec<OperationEvent>>>);

    impl Service<RuleEngineRequest> for RecordingChain {
        type Response = ChainReport;
        type Error = EventHandlerError;
        type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

        fn poll_ready(&mut self, _: &mut std::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, request: RuleEngineRequest) -> Self::Future {
            let RuleEngineRequest::Event(event) = request;
            self.0.lock().unwrap().push(event);
            Box::pin(async { Ok(ChainReport::default()) })
        }
    }

    /// Chain failing every event.
    #[derive(Clone)]
    struct FailingChain;

    impl Service<RuleEngineRequest> for FailingChain {
        type Response = ChainReport;
        type Error = EventHandlerError;
        type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

        fn poll_ready(&mut self, _: &mut std::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _: RuleEngineRequest) -> Self::Future {
            Box::pin(async { Err(EventHandlerError::InternalEventHandlerError) })
        }
    }

    fn path(p: &str) -> ObjectPath {
        ObjectPath::new(p).unwrap()
    }

    fn recorded(chain: &RecordingChain) -> Vec<(Phase, EventKind, Vec<ObjectPath>)> {
        chain.0.lock().unwrap().drain(..).map(|e| (e.phase, e.kind, e.targets)).collect()
    }

    #[tokio::test]
    async fn unit_storage_api_pre_and_post_events() {
        crate::logging::init();
        let chain = RecordingChain::default();
        let mut storage = EventHandlerLayer::new(chain.clone()).layer(StorageService::default());

        storage
            .call(StorageRequest::Put { path: path("/z/f"), data: b"x".to_vec(), force: false })
            .await
            .unwrap();
        assert_eq!(
            recorded(&chain),
            vec![
                (Phase::Pre, EventKind::Put, vec![path("/z/f")]),
                (Phase::Post, EventKind::Put, vec![path("/z/f")])
            ]
        );

        let rename = StorageRequest::Rename { from: path("/z/f"), to: path("/z/g") };
        storage.call(rename).await.unwrap();
        assert_eq!(
            recorded(&chain),
            vec![
                (Phase::Pre, EventKind::Rename, vec![path("/z/f")]),
                (Phase::Post, EventKind::Rename, vec![path("/z/g")])
            ]
        );
    }

    #[tokio::test]
    async fn unit_storage_api_stream_write_existence() {
        let chain = RecordingChain::default();
        let mut storage = EventHandlerMiddleware::new(StorageService::default(), chain.clone());
        let stream_write = |offset| StorageRequest::StreamWrite {
            path: path("/z/f"),
            data: b"hello, world!".to_vec(),
            offset,
            truncate: true,
        };

        storage.call(stream_write(None)).await.unwrap();
        assert_eq!(
            recorded(&chain).into_iter().map(|(_, kind, _)| kind).collect::<Vec<_>>(),
            vec![EventKind::Put, EventKind::Put]
        );

        storage.call(stream_write(Some(1))).await.unwrap();
        assert_eq!(
            recorded(&chain)
                .into_iter()
                .filter(|(phase, _, _)| *phase == Phase::Post)
                .map(|(_, kind, _)| kind)
                .collect::<Vec<_>>(),
            vec![EventKind::Seek, EventKind::Truncate]
        );
    }

    #[tokio::test]
    async fn unit_storage_api_failed_operation_has_no_post_events() {
        let chain = RecordingChain::default();
        let mut storage = EventHandlerMiddleware::new(StorageService::default(), chain.clone());

        assert_eq!(
            storage.call(StorageRequest::Get(path("/z/missing"))).await.unwrap_err(),
            EventHandlerError::ObjectNotFound(path("/z/missing"))
        );
        assert_eq!(recorded(&chain), vec![(Phase::Pre, EventKind::Get, vec![path("/z/missing")])]);
    }

    #[tokio::test]
    async fn unit_storage_api_chain_failure_isolated() {
        let mut storage = EventHandlerMiddleware::new(StorageService::default(), FailingChain);
        storage
            .call(StorageRequest::Put { path: path("/z/f"), data: b"x".to_vec(), force: false })
            .await
            .unwrap();
        assert_eq!(
            storage.call(StorageRequest::Get(path("/z/f"))).await.unwrap(),
            StorageResponse::Data(b"x".to_vec())
        );
    }
}
