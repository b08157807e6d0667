//! # Rule Engine Chain Module
//!
//! Ordered list of rule engine instances. Each operation event is offered to the instances
//! in order; an instance answering [`RuleEngineResponse::Stop`] ends the walk, and an
//! instance failing is logged and skipped.
//!
//! ## Building from configuration
//!
//! [`RuleEngineChain::from_config`] builds the chain from the server configuration:
//!
//! 1. policy engine instances register the policies they provide
//! 2. event handler instances are appended in configuration order, each checked against
//!    the registered policies
//!
//! An instance with a configuration error is logged and left out; the remaining instances
//! still start. Instances of plugins this server does not host are skipped with a warning,
//! including the resource-modified event handler: this server raises no resource
//! administration events.

use std::{future::Future, pin::Pin, sync::Arc, task::Poll};

use tower::{Service, ServiceExt, util::BoxCloneSyncService};
use tracing::{error, info, warn};

use crate::event_handler::{
    api::types::{HandlerReport, RuleEngineRequest, RuleEngineResponse},
    error::{ConfigurationError, EventHandlerError},
    infrastructure::config::{
        EventHandlerConfig, PluginKind, RuleEngineInstanceConfig, ServerConfig,
        TestingPolicyConfig, testing_policy_names,
    },
    services::{
        handler::EventHandlerService,
        metadata::MetadataService,
        policy::{PolicyRegistry, TestingPolicyService},
    },
};

/// Type-erased rule engine instance.
pub type RuleEngineInstance =
    BoxCloneSyncService<RuleEngineRequest, RuleEngineResponse, EventHandlerError>;

/// Aggregated outcome of one event walking the chain.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ChainReport {
    /// Instances the event was offered to
    pub visited: usize,
    /// Instance that stopped the walk, if any
    pub stopped_by: Option<String>,
    pub handled: HandlerReport,
}

/// Outcome of building a chain from configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChainBuildReport {
    pub started: Vec<String>,
    pub failed: Vec<(String, ConfigurationError)>,
    pub skipped: Vec<String>,
}

#[derive(Clone, Default)]
pub struct RuleEngineChain {
    instances: Arc<Vec<(String, RuleEngineInstance)>>,
}

impl std::fmt::Debug for RuleEngineChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleEngineChain").field("instances", &self.instance_names()).finish()
    }
}

impl RuleEngineChain {
    /// Appends an instance, evaluated after the existing ones.
    pub fn push_back<R>(&mut self, instance_name: impl Into<String>, instance: R)
    where
        R: Service<RuleEngineRequest, Response = RuleEngineResponse, Error = EventHandlerError>
            + Clone
            + Send
            + Sync
            + 'static,
        R::Future: Send + 'static,
    {
        Arc::make_mut(&mut self.instances)
            .push((instance_name.into(), BoxCloneSyncService::new(instance)));
    }

    /// Inserts an instance at position 0, evaluated before the existing ones.
    pub fn push_front<R>(&mut self, instance_name: impl Into<String>, instance: R)
    where
        R: Service<RuleEngineRequest, Response = RuleEngineResponse, Error = EventHandlerError>
            + Clone
            + Send
            + Sync
            + 'static,
        R::Future: Send + 'static,
    {
        Arc::make_mut(&mut self.instances)
            .insert(0, (instance_name.into(), BoxCloneSyncService::new(instance)));
    }

    pub fn instance_names(&self) -> Vec<String> {
        self.instances.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Builds the chain described by `config`, with the built-in policies.
    pub fn from_config(
        config: &ServerConfig,
        metadata: MetadataService,
    ) -> (Self, ChainBuildReport) {
        Self::from_config_with_registry(config, metadata, PolicyRegistry::default())
    }

    /// Builds the chain described by `config`, on top of already registered policies.
    pub fn from_config_with_registry(
        config: &ServerConfig,
        metadata: MetadataService,
        mut registry: PolicyRegistry,
    ) -> (Self, ChainBuildReport) {
        let mut report = ChainBuildReport::default();
        let mut instances = Vec::new();
        for (index, instance) in config.instances().into_iter().enumerate() {
            match instance {
                Ok(instance) => instances.push(instance),
                Err(e) => {
                    let name = format!("#{index}");
                    error!("[chain] rule engine instance {} not started: {}", name, e);
                    report.failed.push((name, e));
                }
            }
        }

        // Policy providers first, so event handlers can resolve their policies
        let policy_providers = instances.iter().filter(|instance| {
            PluginKind::from_plugin_name(&instance.plugin_name) == Some(PluginKind::TestingPolicy)
        });
        for instance in policy_providers {
            match TestingPolicyConfig::from_value(&instance.plugin_specific_configuration) {
                Ok(policy_config) => {
                    for name in testing_policy_names() {
                        registry.register(
                            name.clone(),
                            TestingPolicyService::new(metadata.clone())
                                .with_name(name.clone())
                                .with_log_errors(policy_config.log_errors),
                        );
                        info!("[chain] {} provides {}", instance.instance_name, name);
                    }
                    report.started.push(instance.instance_name.clone());
                }
                Err(e) => Self::fail(&mut report, instance, e),
            }
        }

        let mut chain = Self::default();
        for instance in &instances {
            match PluginKind::from_plugin_name(&instance.plugin_name) {
                Some(PluginKind::DataObjectModified) => {
                    match EventHandlerConfig::from_value(
                        &instance.instance_name,
                        &instance.plugin_specific_configuration,
                    )
                    .and_then(|handler_config| {
                        EventHandlerService::new(
                            instance.instance_name.clone(),
                            handler_config,
                            registry.clone(),
                        )
                    }) {
                        Ok(handler) => {
                            info!("[chain] {} started", instance.instance_name);
                            chain.push_back(instance.instance_name.clone(), handler);
                            report.started.push(instance.instance_name.clone());
                        }
                        Err(e) => Self::fail(&mut report, instance, e),
                    }
                }
                Some(PluginKind::TestingPolicy) => {}
                Some(PluginKind::ResourceModified) => {
                    warn!(
                        "[chain] {} skipped, no resource administration events are raised here",
                        instance.instance_name
                    );
                    report.skipped.push(instance.instance_name.clone());
                }
                None => {
                    warn!(
                        "[chain] {} skipped, plugin {} is not hosted here",
                        instance.instance_name, instance.plugin_name
                    );
                    report.skipped.push(instance.instance_name.clone());
                }
            }
        }
        (chain, report)
    }

    fn fail(
        report: &mut ChainBuildReport,
        instance: &RuleEngineInstanceConfig,
        e: ConfigurationError,
    ) {
        error!("[chain] rule engine instance {} not started: {}", instance.instance_name, e);
        report.failed.push((instance.instance_name.clone(), e));
    }
}

impl Service<RuleEngineRequest> for RuleEngineChain {
    type Response = ChainReport;
    type Error = EventHandlerError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _: &mut std::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: RuleEngineRequest) -> Self::Future {
        let instances = self.instances.clone();
        Box::pin(async move {
            let mut report = ChainReport::default();
            for (name, instance) in instances.iter() {
                report.visited += 1;
                match instance.clone().oneshot(request.clone()).await {
                    Ok(RuleEngineResponse::Continue(handled)) => report.handled.merge(handled),
                    Ok(RuleEngineResponse::Stop(handled)) => {
                        report.handled.merge(handled);
                        report.stopped_by = Some(name.clone());
                        break;
                    }
                    Err(e) => warn!("[chain] instance {} failed: {}", name, e),
                }
            }
            Ok(report)
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::event_handler::{
        core::catalog::{Avu, Catalog, DataObject},
        infrastructure::{
            config::{EVENT_HANDLER_PLUGIN, TESTING_POLICY, TESTING_POLICY_PLUGIN},
            naming::{EventKind, ObjectPath, OperationEvent, Phase},
        },
    };

    /// Instance answering a fixed response, or failing.
    #[derive(Clone)]
    struct FixedInstance(Option<RuleEngineResponse>);

    impl Service<RuleEngineRequest> for FixedInstance {
        type Response = RuleEngineResponse;
        type Error = EventHandlerError;
        type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

        fn poll_ready(&mut self, _: &mut std::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _: RuleEngineRequest) -> Self::Future {
            let response = self.0;
            Box::pin(async move { response.ok_or(EventHandlerError::InternalEventHandlerError) })
        }
    }

    fn put_event() -> RuleEngineRequest {
        RuleEngineRequest::Event(OperationEvent::new(
            EventKind::Put,
            Phase::Post,
            vec![ObjectPath::new("/z/f").unwrap()],
        ))
    }

    fn counted(applied: usize) -> HandlerReport {
        HandlerReport { invoked: applied, applied, failed: 0 }
    }

    #[tokio::test]
    async fn unit_chain_order_and_short_circuit() {
        crate::logging::init();
        let mut chain = RuleEngineChain::default();
        chain.push_back("second", FixedInstance(Some(RuleEngineResponse::Stop(counted(2)))));
        chain.push_back("third", FixedInstance(Some(RuleEngineResponse::Continue(counted(4)))));
        chain.push_front("first", FixedInstance(Some(RuleEngineResponse::Continue(counted(1)))));
        assert_eq!(chain.instance_names(), vec!["first", "second", "third"]);

        assert_eq!(
            chain.oneshot(put_event()).await.unwrap(),
            ChainReport {
                visited: 2,
                stopped_by: Some("second".to_string()),
                handled: counted(3)
            }
        );
    }

    #[tokio::test]
    async fn unit_chain_failing_instance_skipped() {
        let mut chain = RuleEngineChain::default();
        chain.push_back("broken", FixedInstance(None));
        chain.push_back("working", FixedInstance(Some(RuleEngineResponse::Continue(counted(1)))));

        assert_eq!(
            chain.oneshot(put_event()).await.unwrap(),
            ChainReport { visited: 2, stopped_by: None, handled: counted(1) }
        );
    }

    #[test]
    fn unit_chain_from_config_isolates_failures() {
        crate::logging::init();
        let config = ServerConfig::from_json_str(
            &json!({
                "plugin_configuration": {
                    "rule_engines": [
                        {
                            "instance_name": "policy_engine-testing_policy-instance",
                            "plugin_name": TESTING_POLICY_PLUGIN,
                            "plugin_specific_configuration": {"log_errors": "true"}
                        },
                        {
                            "instance_name": "handler-bad-policy",
                            "plugin_name": EVENT_HANDLER_PLUGIN,
                            "plugin_specific_configuration": {
                                "policies_to_invoke": [{
                                    "active_policy_clauses": ["post"],
                                    "events": ["put"],
                                    "policy": "policy_missing"
                                }]
                            }
                        },
                        {
                            "instance_name": "handler-missing-key",
                            "plugin_name": EVENT_HANDLER_PLUGIN,
                            "plugin_specific_configuration": {}
                        },
                        {"plugin_name": EVENT_HANDLER_PLUGIN},
                        {
                            "instance_name": "handler-ok",
                            "plugin_name": EVENT_HANDLER_PLUGIN,
                            "plugin_specific_configuration": {
                                "policies_to_invoke": [{
                                    "active_policy_clauses": ["post"],
                                    "events": ["put", "get"],
                                    "policy": TESTING_POLICY,
                                    "configuration": {}
                                }]
                            }
                        },
                        {
                            "instance_name": "rule_engine_language-instance",
                            "plugin_name": "rule_engine_language"
                        }
                    ]
                }
            })
            .to_string(),
        )
        .unwrap();

        let (chain, report) = RuleEngineChain::from_config(&config, MetadataService::default());
        assert_eq!(chain.instance_names(), vec!["handler-ok"]);
        assert_eq!(
            report,
            ChainBuildReport {
                started: vec![
                    "policy_engine-testing_policy-instance".to_string(),
                    "handler-ok".to_string()
                ],
                failed: vec![
                    ("#3".to_string(), ConfigurationError::MissingKey("instance_name")),
                    (
                        "handler-bad-policy".to_string(),
                        ConfigurationError::PolicyNotFound("policy_missing".to_string())
                    ),
                    (
                        "handler-missing-key".to_string(),
                        ConfigurationError::MissingKey("policies_to_invoke")
                    ),
                ],
                skipped: vec!["rule_engine_language-instance".to_string()],
            }
        );
    }

    #[test]
    fn unit_chain_from_config_without_policy_engine() {
        let mut config = ServerConfig::default();
        config.push_front_rule_engine(json!({
            "instance_name": "handler",
            "plugin_name": EVENT_HANDLER_PLUGIN,
            "plugin_specific_configuration": {
                "policies_to_invoke": [{
                    "active_policy_clauses": ["post"],
                    "events": ["put"],
                    "policy": TESTING_POLICY
                }]
            }
        }));
        let (chain, report) = RuleEngineChain::from_config(&config, MetadataService::default());
        assert!(chain.is_empty());
        assert_eq!(
            report.failed,
            vec![(
                "handler".to_string(),
                ConfigurationError::PolicyNotFound(TESTING_POLICY.to_string())
            )]
        );
    }

    #[tokio::test]
    async fn unit_chain_from_config_prefixed_plugin_names() {
        let mut config = ServerConfig::default();
        config.push_front_rule_engine(json!({
            "instance_name": "irods_rule_engine_plugin-event_handler-resource_modified-instance",
            "plugin_name": "irods_rule_engine_plugin-event_handler-resource_modified",
            "plugin_specific_configuration": {"policies_to_invoke": []}
        }));
        config.push_front_rule_engine(json!({
            "instance_name": "irods_rule_engine_plugin-event_handler-data_object_modified-instance",
            "plugin_name": "irods_rule_engine_plugin-event_handler-data_object_modified",
            "plugin_specific_configuration": {
                "policies_to_invoke": [{
                    "active_policy_clauses": ["post"],
                    "events": ["put"],
                    "policy": "irods_policy_testing_policy",
                    "configuration": {}
                }]
            }
        }));
        config.push_front_rule_engine(json!({
            "instance_name": "irods_rule_engine_plugin-policy_engine-testing_policy-instance",
            "plugin_name": "irods_rule_engine_plugin-policy_engine-testing_policy",
            "plugin_specific_configuration": {"log_errors": "true"}
        }));
        let catalog = Catalog::default();
        let f = ObjectPath::new("/z/f").unwrap();
        catalog.insert_new(f.clone(), DataObject::new(Vec::new(), "demoResc")).unwrap();

        let (chain, report) =
            RuleEngineChain::from_config(&config, MetadataService::new(catalog.clone()));
        assert_eq!(
            report,
            ChainBuildReport {
                started: vec![
                    "irods_rule_engine_plugin-policy_engine-testing_policy-instance".to_string(),
                    "irods_rule_engine_plugin-event_handler-data_object_modified-instance"
                        .to_string()
                ],
                failed: Vec::new(),
                skipped: vec![
                    "irods_rule_engine_plugin-event_handler-resource_modified-instance".to_string()
                ],
            }
        );

        assert_eq!(chain.oneshot(put_event()).await.unwrap().handled, counted(1));
        let metadata = catalog.with_object(&f, |o| Ok(o.metadata.clone())).unwrap();
        assert_eq!(metadata, vec![Avu::new("irods_policy_testing_policy", "PUT")]);
    }
}
