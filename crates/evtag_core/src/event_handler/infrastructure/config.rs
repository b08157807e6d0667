//! Server and rule engine instance configuration.
//!
//! The server configuration carries an ordered list of rule engine instances under
//! `plugin_configuration.rule_engines`. Each instance is kept as raw JSON until the chain is
//! built, so that one malformed instance fails on its own without preventing the others
//! from starting.
//!
//! Plugin names are recognized with or without the [`PLUGIN_NAME_PREFIX`] deployed
//! configurations carry, and the tagging policy answers to both of its identifiers.
//!
//! ```json
//! {
//!   "instance_name": "irods_rule_engine_plugin-event_handler-data_object_modified-instance",
//!   "plugin_name": "irods_rule_engine_plugin-event_handler-data_object_modified",
//!   "plugin_specific_configuration": {
//!     "policies_to_invoke": [
//!       {
//!         "active_policy_clauses": ["post"],
//!         "events": ["put", "get", "rename", "copy"],
//!         "policy": "irods_policy_testing_policy",
//!         "configuration": {}
//!       }
//!     ]
//!   }
//! }
//! ```

use std::{collections::HashSet, path::Path};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::event_handler::{
    error::ConfigurationError,
    infrastructure::naming::{EventKind, Phase},
};

/// Optional prefix of plugin names, as found in deployed server configurations.
pub const PLUGIN_NAME_PREFIX: &str = "irods_rule_engine_plugin-";

/// Optional prefix of policy identifiers, as found in deployed server configurations.
pub const POLICY_NAME_PREFIX: &str = "irods_";

/// Plugin name of the data-object-modified event handler.
pub const EVENT_HANDLER_PLUGIN: &str = "event_handler-data_object_modified";

/// Plugin name of the resource-modified event handler, which is not hosted here.
pub const RESOURCE_HANDLER_PLUGIN: &str = "event_handler-resource_modified";

/// Plugin name of the policy engine providing the tagging policy.
pub const TESTING_POLICY_PLUGIN: &str = "policy_engine-testing_policy";

/// Identifier of the tagging policy.
pub const TESTING_POLICY: &str = "policy_testing_policy";

/// Rule engine plugins known to this server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginKind {
    DataObjectModified,
    ResourceModified,
    TestingPolicy,
}

impl PluginKind {
    /// Recognizes a plugin name, with or without [`PLUGIN_NAME_PREFIX`].
    pub fn from_plugin_name(plugin_name: &str) -> Option<Self> {
        match plugin_name.strip_prefix(PLUGIN_NAME_PREFIX).unwrap_or(plugin_name) {
            EVENT_HANDLER_PLUGIN => Some(Self::DataObjectModified),
            RESOURCE_HANDLER_PLUGIN => Some(Self::ResourceModified),
            TESTING_POLICY_PLUGIN => Some(Self::TestingPolicy),
            _ => None,
        }
    }
}

/// Identifiers the tagging policy is registered under.
pub fn testing_policy_names() -> [String; 2] {
    [TESTING_POLICY.to_string(), format!("{POLICY_NAME_PREFIX}{TESTING_POLICY}")]
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default)]
    pub plugin_configuration: PluginConfiguration,
    /// Settings owned by other server components, preserved on write.
    #[serde(flatten)]
    pub other: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PluginConfiguration {
    /// Rule engine instances, in evaluation order.
    #[serde(default)]
    pub rule_engines: Vec<Value>,
}

impl ServerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigurationError> {
        serde_json::from_str(json).map_err(|e| ConfigurationError::Malformed(e.to_string()))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let json = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigurationError::Io(format!("{}: {e}", path.as_ref().display())))?;
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigurationError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigurationError::Malformed(e.to_string()))
    }

    /// Inserts an instance ahead of every other instance, so it is evaluated first.
    pub fn push_front_rule_engine(&mut self, instance: Value) {
        self.plugin_configuration.rule_engines.insert(0, instance);
    }

    /// Parses every instance, keeping per-instance failures separate.
    pub fn instances(&self) -> Vec<Result<RuleEngineInstanceConfig, ConfigurationError>> {
        self.plugin_configuration
            .rule_engines
            .iter()
            .map(|raw| RuleEngineInstanceConfig::from_value(raw.clone()))
            .collect()
    }
}

/// Common envelope of a rule engine instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleEngineInstanceConfig {
    pub instance_name: String,
    pub plugin_name: String,
    #[serde(default)]
    pub plugin_specific_configuration: Value,
}

impl RuleEngineInstanceConfig {
    pub fn from_value(raw: Value) -> Result<Self, ConfigurationError> {
        if raw.get("instance_name").is_none() {
            return Err(ConfigurationError::MissingKey("instance_name"));
        }
        if raw.get("plugin_name").is_none() {
            return Err(ConfigurationError::MissingKey("plugin_name"));
        }
        serde_json::from_value(raw).map_err(|e| ConfigurationError::Malformed(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct RawEventHandlerConfig {
    policies_to_invoke: Option<Vec<RawPolicyInvocation>>,
}

#[derive(Debug, Deserialize)]
struct RawPolicyInvocation {
    active_policy_clauses: Option<Vec<String>>,
    events: Option<Vec<String>>,
    policy: Option<String>,
    #[serde(default)]
    configuration: Value,
}

/// One entry of `policies_to_invoke`, validated.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyInvocation {
    pub active_phases: HashSet<Phase>,
    pub monitored_events: HashSet<EventKind>,
    pub policy: String,
    /// Policy specific, passed through untouched.
    pub configuration: Value,
}

impl PolicyInvocation {
    pub fn new(
        active_phases: impl IntoIterator<Item = Phase>,
        monitored_events: impl IntoIterator<Item = EventKind>,
        policy: impl Into<String>,
    ) -> Self {
        Self {
            active_phases: active_phases.into_iter().collect(),
            monitored_events: monitored_events.into_iter().collect(),
            policy: policy.into(),
            configuration: Value::Object(Default::default()),
        }
    }

    pub fn with_configuration(self, configuration: Value) -> Self {
        Self { configuration, ..self }
    }

    /// Whether an event of this kind and phase fires the policy.
    pub fn matches(&self, kind: EventKind, phase: Phase) -> bool {
        self.active_phases.contains(&phase) && self.monitored_events.contains(&kind)
    }
}

/// Validated configuration of an event handler instance.
#[derive(Debug, Clone, PartialEq)]
pub struct EventHandlerConfig {
    pub policies_to_invoke: Vec<PolicyInvocation>,
}

impl EventHandlerConfig {
    /// Validates `plugin_specific_configuration` of an event handler instance.
    ///
    /// Unrecognized event names are logged and dropped; they never fire.
    pub fn from_value(
        instance_name: &str,
        plugin_specific_configuration: &Value,
    ) -> Result<Self, ConfigurationError> {
        let raw: RawEventHandlerConfig =
            serde_json::from_value(plugin_specific_configuration.clone())
                .map_err(|e| ConfigurationError::Malformed(e.to_string()))?;
        let policies_to_invoke = raw
            .policies_to_invoke
            .ok_or(ConfigurationError::MissingKey("policies_to_invoke"))?
            .into_iter()
            .map(|raw| -> Result<PolicyInvocation, ConfigurationError> {
                let active_phases = raw
                    .active_policy_clauses
                    .ok_or(ConfigurationError::MissingKey("active_policy_clauses"))?
                    .iter()
                    .map(|clause| clause.parse::<Phase>())
                    .collect::<Result<HashSet<_>, _>>()?;
                let monitored_events = raw
                    .events
                    .ok_or(ConfigurationError::MissingKey("events"))?
                    .iter()
                    .filter_map(|name| match name.parse::<EventKind>() {
                        Ok(kind) => Some(kind),
                        Err(e) => {
                            warn!("[config-{}] {}, ignored", instance_name, e);
                            None
                        }
                    })
                    .collect::<HashSet<_>>();
                let policy = raw.policy.ok_or(ConfigurationError::MissingKey("policy"))?;
                Ok(PolicyInvocation {
                    active_phases,
                    monitored_events,
                    policy,
                    configuration: raw.configuration,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { policies_to_invoke })
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Text(String),
}

#[derive(Debug, Default, Deserialize)]
struct RawTestingPolicyConfig {
    log_errors: Option<Flag>,
}

/// Instance configuration of the testing policy engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestingPolicyConfig {
    /// Report policy failures at error level instead of debug.
    pub log_errors: bool,
}

impl TestingPolicyConfig {
    pub fn from_value(plugin_specific_configuration: &Value) -> Result<Self, ConfigurationError> {
        if plugin_specific_configuration.is_null() {
            return Ok(Self::default());
        }
        let raw: RawTestingPolicyConfig =
            serde_json::from_value(plugin_specific_configuration.clone())
                .map_err(|e| ConfigurationError::Malformed(e.to_string()))?;
        let log_errors = match raw.log_errors {
            None => false,
            Some(Flag::Bool(flag)) => flag,
            Some(Flag::Text(text)) => match text.trim().to_ascii_lowercase().as_str() {
                "true" => true,
                "false" => false,
                _ => return Err(ConfigurationError::Malformed(format!("log_errors: {text}"))),
            },
        };
        Ok(Self { log_errors })
    }
}
