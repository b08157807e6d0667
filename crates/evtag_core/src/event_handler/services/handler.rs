//! # Event Handler Module
//!
//! One configured instance of the data-object-modified event handler.
//!
//! For each operation event received from the rule engine chain, the handler walks its
//! `policies_to_invoke` in configuration order and, for every entry whose active clauses
//! contain the event phase and whose events contain the event kind, invokes the named
//! policy once per event target. Targets of one entry are handled concurrently.
//!
//! Policy failures are logged and counted in the returned [`HandlerReport`]; they never
//! surface as errors, so the storage operation that produced the event is unaffected.
//! The handler holds no state besides its immutable configuration.

use std::{future::Future, pin::Pin, sync::Arc, task::Poll};

use futures::future::join_all;
use tower::{Service, ServiceExt};
use tracing::{debug, info, warn};

use crate::event_handler::{
    api::types::{
        HandlerReport, PolicyRequest, PolicyResponse, RuleEngineRequest, RuleEngineResponse,
    },
    error::{ConfigurationError, EventHandlerError},
    infrastructure::config::{EventHandlerConfig, PolicyInvocation},
    services::policy::PolicyRegistry,
};

#[derive(Debug, Clone)]
pub struct EventHandlerService {
    instance_name: String,
    policies_to_invoke: Arc<Vec<PolicyInvocation>>,
    registry: PolicyRegistry,
}

impl EventHandlerService {
    /// Creates an event handler instance.
    ///
    /// Fails if a configured policy is not provided by `registry`.
    pub fn new(
        instance_name: impl Into<String>,
        config: EventHandlerConfig,
        registry: PolicyRegistry,
    ) -> Result<Self, ConfigurationError> {
        if let Some(missing) = config
            .policies_to_invoke
            .iter()
            .find(|invocation| !registry.contains(&invocation.policy))
        {
            return Err(ConfigurationError::PolicyNotFound(missing.policy.clone()));
        }
        Ok(Self {
            instance_name: instance_name.into(),
            policies_to_invoke: Arc::new(config.policies_to_invoke),
            registry,
        })
    }

    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }
}

impl Service<RuleEngineRequest> for EventHandlerService {
    type Response = RuleEngineResponse;
    type Error = EventHandlerError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _: &mut std::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: RuleEngineRequest) -> Self::Future {
        let this = self.clone();
        Box::pin(async move {
            let RuleEngineRequest::Event(event) = request;
            let mut report = HandlerReport::default();
            for invocation in
                this.policies_to_invoke.iter().filter(|i| i.matches(event.kind, event.phase))
            {
                let policy = match this.registry.get(&invocation.policy) {
                    Ok(policy) => policy,
                    Err(e) => {
                        warn!("[event_handler-{}] {}", this.instance_name, e);
                        report.invoked += event.targets.len();
                        report.failed += event.targets.len();
                        continue;
                    }
                };
                info!(
                    "[event_handler-{}] {} {}: policy: {}, targets: {:?}",
                    this.instance_name, event.phase, event.kind, invocation.policy, event.targets
                );
                let results = join_all(event.targets.iter().map(|target| {
                    policy.clone().oneshot(PolicyRequest::Invoke {
                        event: event.clone(),
                        target: target.clone(),
                        configuration: invocation.configuration.clone(),
                    })
                }))
                .await;
                for (target, result) in event.targets.iter().zip(results) {
                    report.invoked += 1;
                    match result {
                        Ok(PolicyResponse::Applied) => report.applied += 1,
                        Ok(PolicyResponse::Skipped) => {}
                        Err(e) => {
                            warn!(
                                "[event_handler-{}] {} {} on {} failed: {}",
                                this.instance_name, event.phase, event.kind, target, e
                            );
                            report.failed += 1;
                        }
                    }
                }
            }
            if report.invoked == 0 {
                debug!(
                    "[event_handler-{}] {} {} not monitored",
                    this.instance_name, event.phase, event.kind
                );
            }
            Ok(RuleEngineResponse::Continue(report))
        })
    }
}
