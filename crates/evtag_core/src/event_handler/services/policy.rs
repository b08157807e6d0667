//! # Policy Module
//!
//! Policies are the actions event handler instances invoke when a monitored event occurs.
//! They are looked up by identifier in a [`PolicyRegistry`], a dispatch table of boxed tower
//! services filled in when the rule engine chain is built. Policy engine instances register
//! the policies they provide; custom policies can be registered explicitly.
//!
//! ## Tagging policy
//!
//! [`TestingPolicyService`] records the canonical tag of the event on the target object as
//! an attribute/value/unit triple:
//!
//! - attribute: the policy identifier, or `configuration.attribute` when given
//! - value: the event tag (`PUT`, `GET`, `RENAME`, ...)
//! - unit: `configuration.unit`, empty by default
//!
//! Write failures are returned to the caller and logged at error level when the policy
//! engine instance sets `log_errors`, at debug level otherwise.

use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc, task::Poll};

use tower::{Service, ServiceExt, util::BoxCloneSyncService};
use tracing::{debug, error, info};

use crate::event_handler::{
    api::types::{MetadataRequest, MetadataResponse, PolicyRequest, PolicyResponse},
    core::catalog::Avu,
    error::EventHandlerError,
    infrastructure::config::TESTING_POLICY,
    services::metadata::MetadataService,
};

/// Type-erased policy service.
pub type PolicyService = BoxCloneSyncService<PolicyRequest, PolicyResponse, EventHandlerError>;

/// Dispatch table from policy identifier to policy service.
#[derive(Clone, Default)]
pub struct PolicyRegistry {
    policies: Arc<HashMap<String, PolicyService>>,
}

impl std::fmt::Debug for PolicyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyRegistry").field("policies", &self.names()).finish()
    }
}

impl PolicyRegistry {
    /// Registers a policy, replacing any policy previously registered under `name`.
    pub fn register<P>(&mut self, name: impl Into<String>, policy: P)
    where
        P: Service<PolicyRequest, Response = PolicyResponse, Error = EventHandlerError>
            + Clone
            + Send
            + Sync
            + 'static,
        P::Future: Send + 'static,
    {
        Arc::make_mut(&mut self.policies).insert(name.into(), BoxCloneSyncService::new(policy));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.policies.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Result<PolicyService, EventHandlerError> {
        self.policies
            .get(name)
            .cloned()
            .ok_or_else(|| EventHandlerError::PolicyNotFound(name.to_string()))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.policies.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Policy writing the event tag as metadata on the target object.
#[derive(Debug, Clone)]
pub struct TestingPolicyService<M = MetadataService> {
    /// Policy identifier, default metadata attribute
    name: String,
    /// Report failures at error level
    log_errors: bool,
    metadata: M,
}

impl<M> TestingPolicyService<M> {
    pub fn new(metadata: M) -> Self {
        Self { name: TESTING_POLICY.to_string(), log_errors: false, metadata }
    }

    pub fn with_log_errors(self, log_errors: bool) -> Self {
        Self { log_errors, ..self }
    }

    pub fn with_name(self, name: impl Into<String>) -> Self {
        Self { name: name.into(), ..self }
    }
}

impl<M> Service<PolicyRequest> for TestingPolicyService<M>
where
    M: Service<MetadataRequest, Response = MetadataResponse, Error = EventHandlerError>
        + Clone
        + Send
        + 'static,
    M::Future: Send,
{
    type Response = PolicyResponse;
    type Error = EventHandlerError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _: &mut std::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: PolicyRequest) -> Self::Future {
        let name = self.name.clone();
        let log_errors = self.log_errors;
        let metadata = self.metadata.clone();
        Box::pin(async move {
            match request {
                PolicyRequest::Invoke { event, target, configuration } => {
                    let attribute = configuration
                        .get("attribute")
                        .and_then(|v| v.as_str())
                        .unwrap_or(name.as_str());
                    let unit =
                        configuration.get("unit").and_then(|v| v.as_str()).unwrap_or_default();
                    let avu = Avu::new(attribute, event.kind.tag()).with_unit(unit);
                    info!("[policy-{}] {} {}: target: {}", name, event.phase, event.kind, target);
                    match metadata.oneshot(MetadataRequest::Add { path: target, avu }).await {
                        Ok(_) => Ok(PolicyResponse::Applied),
                        Err(e) => {
                            if log_errors {
                                error!("[policy-{}] {}", name, e);
                            } else {
                                debug!("[policy-{}] {}", name, e);
                            }
                            Err(e)
                        }
                    }
                }
            }
        })
    }
}
