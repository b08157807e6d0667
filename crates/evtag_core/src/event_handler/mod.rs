//! Event handler module.
//!
//! Tags data objects with the kind of operation performed on them. Storage operations are
//! classified into operation events, offered to an ordered chain of rule engine instances,
//! and event handler instances invoke the configured policies for the events they monitor.
//!
//! ## APIs
//!
//! ### Storage API
//! Object operations issued by clients (put, get, create, read, write, rename, copy,
//! register, replicate, checksum, truncate and their streaming variants). The
//! [`api::storage::EventHandlerMiddleware`] wraps the storage backend and emits pre- and
//! post-operation events around each request.
//!
//! ### Inspect API
//! Metadata read-back for operators: list the triples of an object, check for a tag,
//! remove a triple.
//!
//! ## Service Components
//! - **Storage**: in-memory catalog of data objects, their replicas and metadata
//! - **Chain**: ordered rule engine instances built from the server configuration
//! - **Handler**: event handler instances matching events against their policy clauses
//! - **Policy**: named policies, including the tagging policy
//!
//! ## Default Service Stack
//!
//! [`init_event_handler`] wires the storage backend, the chain and the inspect service
//! around one shared catalog.
pub mod api;
pub mod core;
pub mod error;
pub mod infrastructure;
pub mod services;

/// Storage backend wrapped by the event handler middleware.
pub type EventHandlerDefaultStack = api::storage::EventHandlerMiddleware<
    services::storage::StorageService,
    services::chain::RuleEngineChain,
>;

/// Inspect API over the metadata of the default stack.
pub type InspectApiDefaultStack =
    api::inspect::InspectApiService<services::metadata::MetadataService>;

/// Initialize the storage and inspect services from a server configuration.
///
/// Instances with configuration errors are left out of the chain and listed in the
/// returned [`services::chain::ChainBuildReport`]; the stack is usable regardless.
pub fn init_event_handler(
    config: &infrastructure::config::ServerConfig,
    resource: &str,
) -> (EventHandlerDefaultStack, InspectApiDefaultStack, services::chain::ChainBuildReport) {
    init_event_handler_with_policies(config, resource, services::policy::PolicyRegistry::default())
}

/// Initialize the default stack on top of already registered policies.
///
/// Policies registered in `registry` are visible to every event handler instance, next
/// to the ones provided by policy engine instances of the configuration.
pub fn init_event_handler_with_policies(
    config: &infrastructure::config::ServerConfig,
    resource: &str,
    registry: services::policy::PolicyRegistry,
) -> (EventHandlerDefaultStack, InspectApiDefaultStack, services::chain::ChainBuildReport) {
    let catalog = core::catalog::Catalog::default();
    let metadata = services::metadata::MetadataService::new(catalog.clone());
    let storage = services::storage::StorageService::new(catalog).with_resource(resource);
    let (chain, report) = services::chain::RuleEngineChain::from_config_with_registry(
        config,
        metadata.clone(),
        registry,
    );

    let storage_service: EventHandlerDefaultStack = tower::ServiceBuilder::new()
        .layer(api::storage::EventHandlerLayer::new(chain))
        .service(storage);
    let inspect_service: InspectApiDefaultStack = api::inspect::InspectApiService::new(metadata);

    (storage_service, inspect_service, report)
}
