use thiserror::Error;

use crate::event_handler::infrastructure::naming::ObjectPath;

/// Errors raised while loading or validating a rule engine instance configuration.
///
/// These are fatal to the affected instance only: the chain skips it and keeps starting
/// the remaining instances.
#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigurationError {
    #[error("malformed configuration ({0})")]
    Malformed(String),

    #[error("missing required key ({0})")]
    MissingKey(&'static str),

    #[error("invalid policy clause ({0})")]
    InvalidPhase(String),

    #[error("policy is not provided by any rule engine instance ({0})")]
    PolicyNotFound(String),

    #[error("failed to read configuration ({0})")]
    Io(String),
}

#[derive(Debug, Error, PartialEq, Clone)]
pub enum EventHandlerError {
    #[error("Event handler error, internal error")]
    InternalEventHandlerError,

    #[error("Event handler error, configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Event handler error, unrecognized event ({0})")]
    UnrecognizedEvent(String),

    #[error("Event handler error, failed to write metadata (path: {0})")]
    MetadataWrite(ObjectPath),

    #[error("Event handler error, invalid path ({0})")]
    InvalidPath(String),

    #[error("Event handler error, object not found (path: {0})")]
    ObjectNotFound(ObjectPath),

    #[error("Event handler error, object already exists (path: {0})")]
    ObjectAlreadyExists(ObjectPath),

    #[error("Event handler error, invalid range (path: {0}, offset: {1})")]
    InvalidRange(ObjectPath, u64),

    #[error("Event handler error, replica already exists (path: {0}, resource: {1})")]
    ReplicaExists(ObjectPath, String),

    #[error("Event handler error, policy not found ({0})")]
    PolicyNotFound(String),
}
