//! End-to-end tests for the notification pipeline: what is published,
//! in which order, and only after commit.

use std::sync::Arc;

use infra_inventory::*;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

type Log = Arc<Mutex<Vec<String>>>;

/// Record every matching notification as `"<action> <what>"`.
fn record(inventory: &Inventory<MemoryBackend>, log: &Log, interests: &[Interest]) {
    for interest in interests {
        let log = Arc::clone(log);
        inventory.observe(*interest, move |n| {
            let what = match n {
                Notification::Entity { entity, .. } => entity.path().to_string(),
                Notification::Relationship { relationship, .. } => {
                    format!("{} {}->{}", relationship.name, relationship.source, relationship.target)
                }
            };
            log.lock().push(format!("{} {what}", n.action()));
        });
    }
}

async fn tenant_with_types(inventory: &Inventory<MemoryBackend>) -> Single<MemoryBackend, Tenant> {
    let t1 = inventory.tenants().create(TenantBlueprint::new("t1")).await.unwrap();
    t1.environments().create(EnvironmentBlueprint::new("e1")).await.unwrap();
    t1.resource_types().create(ResourceTypeBlueprint::new("rt1", "v1")).await.unwrap();
    t1
}

#[tokio::test]
async fn test_resource_creation_publishes_entity_then_relationships() {
    let inventory = Inventory::open_memory().await.unwrap();
    let t1 = tenant_with_types(&inventory).await;

    let log = Log::default();
    record(
        &inventory,
        &log,
        &[
            Interest::new(EntityKind::Resource, Action::Created),
            Interest::relationships(Action::Created),
        ],
    );

    t1.environments()
        .get("e1")
        .feedless_resources()
        .create(ResourceBlueprint::new("r1", "rt1"))
        .await
        .unwrap();

    assert_eq!(
        *log.lock(),
        vec![
            "created /t;t1/e;e1/r;r1",
            "created contains /t;t1/e;e1->/t;t1/e;e1/r;r1",
            "created defines /t;t1/rt;rt1->/t;t1/e;e1/r;r1",
        ]
    );
}

#[tokio::test]
async fn test_failed_wire_up_publishes_nothing() {
    let inventory = Inventory::open_memory().await.unwrap();
    let t1 = tenant_with_types(&inventory).await;
    let log = Log::default();
    record(
        &inventory,
        &log,
        &[
            Interest::new(EntityKind::Resource, Action::Created),
            Interest::relationships(Action::Created),
        ],
    );
    let before = (inventory.backend().entity_count(), inventory.backend().relationship_count());

    let err = t1
        .environments()
        .get("e1")
        .feedless_resources()
        .create(ResourceBlueprint::new("r1", "no-such-type"))
        .await
        .err()
        .unwrap();

    assert!(matches!(err, Error::InvalidArgument(_)), "got {err:?}");
    assert!(log.lock().is_empty());
    assert_eq!((inventory.backend().entity_count(), inventory.backend().relationship_count()), before);
    assert!(!t1.environments().get("e1").feedless_resources().get("r1").exists().await.unwrap());
}

#[tokio::test]
async fn test_observer_sees_committed_entity() {
    let backend = MemoryBackend::new();
    let inventory = Inventory::with_backend(backend.clone());
    let seen = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&seen);
    inventory.observe(Interest::new(EntityKind::Tenant, Action::Created), move |n| {
        if let Some(entity) = n.as_entity() {
            sink.lock().push(backend.committed_entity(entity.path()));
        }
    });

    inventory.tenants().create(TenantBlueprint::new("acme")).await.unwrap();

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].as_ref().map(Entity::id), Some("acme"));
}

#[tokio::test]
async fn test_delete_publishes_detached_relationships_first() {
    let inventory = Inventory::open_memory().await.unwrap();
    let t1 = tenant_with_types(&inventory).await;
    let resources = t1.environments().get("e1").feedless_resources();
    resources.create(ResourceBlueprint::new("r1", "rt1")).await.unwrap();

    let log = Log::default();
    record(
        &inventory,
        &log,
        &[
            Interest::new(EntityKind::Resource, Action::Deleted),
            Interest::relationships(Action::Deleted),
        ],
    );
    resources.delete("r1").await.unwrap();

    let log = log.lock();
    assert_eq!(log.len(), 3);
    assert_eq!(log.last().map(String::as_str), Some("deleted /t;t1/e;e1/r;r1"));
    assert!(log[..2].iter().all(|l| l.starts_with("deleted ")));
}

#[tokio::test]
async fn test_updates_and_associations_notify() {
    let inventory = Inventory::open_memory().await.unwrap();
    let t1 = tenant_with_types(&inventory).await;
    let log = Log::default();
    record(
        &inventory,
        &log,
        &[
            Interest::new(EntityKind::Environment, Action::Updated),
            Interest::relationships(Action::Created),
            Interest::relationships(Action::Deleted),
        ],
    );

    t1.environments().update("e1", Update::new().with_property("stage", "live")).await.unwrap();
    t1.metric_types().create(MetricTypeBlueprint::new("mt1", MetricUnit::Bytes)).await.unwrap();
    let rt1 = t1.resource_types().get("rt1");
    let mt1: CanonicalPath = "/t;t1/mt;mt1".parse().unwrap();
    rt1.metric_types().associate(&mt1).await.unwrap();
    rt1.metric_types().disassociate(&mt1).await.unwrap();

    assert_eq!(
        *log.lock(),
        vec![
            "updated /t;t1/e;e1",
            "created contains /t;t1->/t;t1/mt;mt1",
            "created owns /t;t1/rt;rt1->/t;t1/mt;mt1",
            "deleted owns /t;t1/rt;rt1->/t;t1/mt;mt1",
        ]
    );
}

#[tokio::test]
async fn test_panicking_observer_does_not_undo_commit() {
    let inventory = Inventory::open_memory().await.unwrap();
    let interest = Interest::new(EntityKind::Tenant, Action::Created);
    inventory.observe(interest, |_| panic!("observer exploded"));
    let log = Log::default();
    record(&inventory, &log, &[interest]);

    inventory.tenants().create(TenantBlueprint::new("t1")).await.unwrap();

    assert!(inventory.tenants().get("t1").exists().await.unwrap());
    assert_eq!(*log.lock(), vec!["created /t;t1"]);
}

#[tokio::test]
async fn test_unobserve_stops_delivery() {
    let inventory = Inventory::open_memory().await.unwrap();
    let interest = Interest::new(EntityKind::Tenant, Action::Created);
    let log = Log::default();
    let sink = Arc::clone(&log);
    let id = inventory.observe(interest, move |n| sink.lock().push(n.to_string()));
    assert!(inventory.has_observers(&interest));

    inventory.tenants().create(TenantBlueprint::new("a")).await.unwrap();
    assert!(inventory.unobserve(id));
    assert!(!inventory.has_observers(&interest));
    inventory.tenants().create(TenantBlueprint::new("b")).await.unwrap();

    assert_eq!(log.lock().len(), 1);
}
