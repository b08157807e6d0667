use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use evtag_core::event_handler::{
    api::{RuleEngineRequest, StorageRequest},
    core::{
        catalog::{Catalog, DataObject},
        classifier::classify,
    },
    infrastructure::{
        config::{EVENT_HANDLER_PLUGIN, ServerConfig, TESTING_POLICY, TESTING_POLICY_PLUGIN},
        naming::{EventKind, ObjectPath, OperationEvent, Phase},
    },
    init_event_handler,
    services::{chain::RuleEngineChain, metadata::MetadataService, storage::DEFAULT_RESOURCE},
};
use serde_json::json;
use tower::Service;

fn object(i: usize) -> ObjectPath {
    ObjectPath::resolve("/tempZone/home/rods", &format!("bench_{i}.txt")).unwrap()
}

fn server_config(events: &[&str]) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.push_front_rule_engine(json!({
        "instance_name": "event_handler-data_object_modified-instance",
        "plugin_name": EVENT_HANDLER_PLUGIN,
        "plugin_specific_configuration": {
            "policies_to_invoke": [{
                "active_policy_clauses": ["post"],
                "events": events,
                "policy": TESTING_POLICY,
                "configuration": {}
            }]
        }
    }));
    config.push_front_rule_engine(json!({
        "instance_name": "policy_engine-testing_policy-instance",
        "plugin_name": TESTING_POLICY_PLUGIN,
        "plugin_specific_configuration": {"log_errors": "true"}
    }));
    config
}

// Classifier Benchmarks
fn bench_classify_stream_write(c: &mut Criterion) {
    let request = StorageRequest::StreamWrite {
        path: object(0),
        data: b"hello, world!".to_vec(),
        offset: Some(1),
        truncate: true,
    };
    c.bench_function("classify_stream_write", |b| {
        b.iter(|| black_box(classify(&request, Phase::Post, true)));
    });
}

// Chain Benchmarks
fn bench_chain_tag_event(c: &mut Criterion) {
    let catalog = Catalog::default();
    catalog.insert_new(object(0), DataObject::new(Vec::new(), DEFAULT_RESOURCE)).unwrap();
    let (chain, _) =
        RuleEngineChain::from_config(&server_config(&["put"]), MetadataService::new(catalog));
    let event =
        RuleEngineRequest::Event(OperationEvent::new(EventKind::Put, Phase::Post, vec![object(0)]));

    c.bench_function("chain_tag_event", |b| {
        b.to_async(tokio::runtime::Runtime::new().unwrap()).iter(|| {
            let mut chain = chain.clone();
            let event = event.clone();
            async move {
                let _ = black_box(chain.call(event).await);
            }
        });
    });
}

fn bench_chain_unmonitored_event(c: &mut Criterion) {
    let (chain, _) =
        RuleEngineChain::from_config(&server_config(&["put"]), MetadataService::default());
    let event =
        RuleEngineRequest::Event(OperationEvent::new(EventKind::Get, Phase::Post, vec![object(0)]));

    c.bench_function("chain_unmonitored_event", |b| {
        b.to_async(tokio::runtime::Runtime::new().unwrap()).iter(|| {
            let mut chain = chain.clone();
            let event = event.clone();
            async move {
                let _ = black_box(chain.call(event).await);
            }
        });
    });
}

// Storage stack Benchmarks
fn bench_stack_put_get(c: &mut Criterion) {
    c.bench_function("stack_put_get", |b| {
        b.to_async(tokio::runtime::Runtime::new().unwrap()).iter_batched(
            || init_event_handler(&server_config(&["put", "get"]), DEFAULT_RESOURCE).0,
            |mut storage| async move {
                let f = object(0);
                let put =
                    StorageRequest::Put { path: f.clone(), data: b"x".to_vec(), force: false };
                let _ = storage.call(put).await;
                let _ = black_box(storage.call(StorageRequest::Get(f)).await);
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_stack_concurrent_puts(c: &mut Criterion) {
    c.bench_function("stack_concurrent_puts", |b| {
        b.to_async(tokio::runtime::Runtime::new().unwrap()).iter_batched(
            || init_event_handler(&server_config(&["put"]), DEFAULT_RESOURCE).0,
            |storage| async move {
                let mut tasks = Vec::new();
                for i in 0..100 {
                    let mut storage = storage.clone();
                    tasks.push(tokio::spawn(async move {
                        let put =
                            StorageRequest::Put { path: object(i), data: Vec::new(), force: false };
                        let _ = storage.call(put).await;
                    }));
                }
                for task in tasks {
                    let _ = task.await;
                }
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(classifier_benches, bench_classify_stream_write);

criterion_group!(chain_benches, bench_chain_tag_event, bench_chain_unmonitored_event);

criterion_group!(stack_benches, bench_stack_put_get, bench_stack_concurrent_puts);

criterion_main!(classifier_benches, chain_benches, stack_benches);
