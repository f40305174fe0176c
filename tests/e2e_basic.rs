//! End-to-end tests for entity creation, lookup, update and deletion.
//!
//! Each test drives the fluent API against a fresh in-memory inventory.

use infra_inventory::*;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

// ============================================================================
// Helper: tenant t1 with environment e1, resource type rt1 and metric type mt1.
// ============================================================================

async fn setup() -> Inventory<MemoryBackend> {
    let inventory = Inventory::open_memory().await.unwrap();
    let t1 = inventory.tenants().create(TenantBlueprint::new("t1")).await.unwrap();
    t1.environments().create(EnvironmentBlueprint::new("e1")).await.unwrap();
    t1.resource_types().create(ResourceTypeBlueprint::new("rt1", "v1")).await.unwrap();
    t1.metric_types().create(MetricTypeBlueprint::new("mt1", MetricUnit::Bytes)).await.unwrap();
    inventory
}

fn path(s: &str) -> CanonicalPath {
    s.parse().unwrap()
}

// ============================================================================
// 1. Creation
// ============================================================================

#[tokio::test]
async fn test_create_and_read_back_tenant() {
    let inventory = Inventory::open_memory().await.unwrap();
    let created = inventory
        .tenants()
        .create(TenantBlueprint::new("acme").with_property("owner", "ops"))
        .await
        .unwrap();

    let tenant = created.entity().await.unwrap();
    assert_eq!(tenant.path, path("/t;acme"));
    assert_eq!(tenant.properties.get("owner"), Some(&Value::from("ops")));

    let fetched = inventory.tenants().get("acme").entity().await.unwrap();
    assert_eq!(fetched, tenant);
}

#[tokio::test]
async fn test_create_resource_wires_defines() {
    let inventory = setup().await;
    let e1 = inventory.tenants().get("t1").environments().get("e1");

    let r1 = e1
        .feedless_resources()
        .create(ResourceBlueprint::new("r1", "rt1"))
        .await
        .unwrap()
        .entity()
        .await
        .unwrap();

    assert_eq!(r1.path, path("/t;t1/e;e1/r;r1"));
    assert_eq!(r1.resource_type, path("/t;t1/rt;rt1"));

    let defined = inventory
        .tenants()
        .get("t1")
        .resource_types()
        .get("rt1")
        .resources()
        .all()
        .entities(&Pager::unlimited())
        .await
        .unwrap();
    assert_eq!(defined.items, vec![r1]);
}

#[tokio::test]
async fn test_create_without_id_generates_one() {
    let inventory = setup().await;
    let e1 = inventory.tenants().get("t1").environments().get("e1");

    let feed = e1.feeds().create(FeedBlueprint::default()).await.unwrap().entity().await.unwrap();
    assert!(!feed.id().is_empty());
    assert_eq!(feed.path.environment_id(), Some("e1"));

    let metric = e1
        .feedless_metrics()
        .create(MetricBlueprint::of_type("mt1"))
        .await
        .unwrap()
        .entity()
        .await
        .unwrap();
    assert_eq!(metric.metric_type, path("/t;t1/mt;mt1"));
}

#[tokio::test]
async fn test_resources_under_feed() {
    let inventory = setup().await;
    let feed = inventory
        .tenants()
        .get("t1")
        .environments()
        .get("e1")
        .feeds()
        .create(FeedBlueprint::new("agent"))
        .await
        .unwrap();

    let r = feed.resources().create(ResourceBlueprint::new("db", "rt1")).await.unwrap();
    assert_eq!(r.entity().await.unwrap().path, path("/t;t1/e;e1/f;agent/r;db"));

    // Resources in a feed are not feedless.
    let feedless = inventory
        .tenants()
        .get("t1")
        .environments()
        .get("e1")
        .feedless_resources()
        .all()
        .entities(&Pager::unlimited())
        .await
        .unwrap();
    assert!(feedless.is_empty());
}

#[tokio::test]
async fn test_duplicate_create_fails() {
    let inventory = setup().await;
    let err = inventory.tenants().create(TenantBlueprint::new("t1")).await.err().unwrap();
    assert!(matches!(err, Error::EntityAlreadyExists(_)), "got {err:?}");

    let envs = inventory.tenants().get("t1").environments();
    let err = envs.create(EnvironmentBlueprint::new("e1")).await.err().unwrap();
    assert!(matches!(err, Error::EntityAlreadyExists(_)));
}

#[tokio::test]
async fn test_create_under_missing_parent_fails() {
    let inventory = setup().await;
    let err = inventory
        .tenants()
        .get("nope")
        .environments()
        .create(EnvironmentBlueprint::new("e"))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, Error::EntityNotFound(_)));
    assert_eq!(inventory.backend().entity_count(), 4);
}

#[tokio::test]
async fn test_invalid_id_is_rejected() {
    let inventory = Inventory::open_memory().await.unwrap();
    let err = inventory.tenants().create(TenantBlueprint::new("a/b")).await.err().unwrap();
    assert!(matches!(err, Error::InvalidPath(_)));
    assert_eq!(inventory.backend().entity_count(), 0);
}

// ============================================================================
// 2. Lookup
// ============================================================================

#[tokio::test]
async fn test_missing_entity() {
    let inventory = setup().await;
    let missing = inventory.tenants().get("t1").environments().get("nope");

    assert!(matches!(missing.entity().await, Err(Error::EntityNotFound(_))));
    assert!(!missing.exists().await.unwrap());
    assert!(inventory.tenants().get("t1").exists().await.unwrap());
}

#[tokio::test]
async fn test_same_id_different_kinds_do_not_collide() {
    let inventory = setup().await;
    let t1 = inventory.tenants().get("t1");
    t1.environments().create(EnvironmentBlueprint::new("shared")).await.unwrap();
    t1.resource_types().create(ResourceTypeBlueprint::new("shared", "1")).await.unwrap();

    let env = t1.environments().get("shared").entity().await.unwrap();
    let rt = t1.resource_types().get("shared").entity().await.unwrap();
    assert_eq!(env.path, path("/t;t1/e;shared"));
    assert_eq!(rt.path, path("/t;t1/rt;shared"));
}

// ============================================================================
// 3. Update
// ============================================================================

#[tokio::test]
async fn test_update_resource_type() {
    let inventory = setup().await;
    let types = inventory.tenants().get("t1").resource_types();

    types
        .update("rt1", Update::new().with_version("v2").with_property("vendor", "acme"))
        .await
        .unwrap();

    let rt = types.get("rt1").entity().await.unwrap();
    assert_eq!(rt.version, "v2");
    assert_eq!(rt.properties.get("vendor"), Some(&Value::from("acme")));
}

#[tokio::test]
async fn test_update_rejects_foreign_fields() {
    let inventory = setup().await;
    let envs = inventory.tenants().get("t1").environments();

    let err = envs.update("e1", Update::new().with_version("v9")).await.err().unwrap();
    assert!(matches!(err, Error::InvalidArgument(_)));

    let err = envs.update("missing", Update::new()).await.err().unwrap();
    assert!(matches!(err, Error::EntityNotFound(_)));
}

// ============================================================================
// 4. Delete
// ============================================================================

#[tokio::test]
async fn test_delete_leaf_detaches_relationships() {
    let inventory = setup().await;
    let e1 = inventory.tenants().get("t1").environments().get("e1");
    e1.feedless_resources().create(ResourceBlueprint::new("r1", "rt1")).await.unwrap();
    let rels_before = inventory.backend().relationship_count();

    e1.feedless_resources().delete("r1").await.unwrap();

    assert!(!e1.feedless_resources().get("r1").exists().await.unwrap());
    // contains and defines are gone with the resource.
    assert_eq!(inventory.backend().relationship_count(), rels_before - 2);
}

#[tokio::test]
async fn test_delete_parent_with_children_is_forbidden() {
    let inventory = setup().await;
    let err = inventory.tenants().delete("t1").await.err().unwrap();
    assert!(matches!(err, Error::ConstraintViolation(_)));
    assert!(inventory.tenants().get("t1").exists().await.unwrap());
}

#[tokio::test]
async fn test_deleted_path_can_be_recreated_fresh() {
    let inventory = setup().await;
    let envs = inventory.tenants().get("t1").environments();
    envs.delete("e1").await.unwrap();
    envs.create(EnvironmentBlueprint::new("e1")).await.unwrap();

    let env = envs.get("e1").entity().await.unwrap();
    assert!(env.properties.is_empty());
}

// ============================================================================
// 5. Canonical paths
// ============================================================================

proptest! {
    #[test]
    fn canonical_path_display_parses_back(
        tenant in "[a-z0-9-]{1,12}",
        env in "[a-z0-9-]{1,12}",
        feed in "[a-zA-Z0-9._]{1,12}",
        resource in "[a-z0-9:]{1,12}",
    ) {
        let p = CanonicalPath::builder()
            .tenant(&tenant)
            .environment(&env)
            .feed(&feed)
            .resource(&resource)
            .build()
            .unwrap();

        let parsed: CanonicalPath = p.to_string().parse().unwrap();
        prop_assert_eq!(&parsed, &p);
        prop_assert_eq!(parsed.tenant_id(), tenant.as_str());
        prop_assert_eq!(parsed.feed_id(), Some(feed.as_str()));
        prop_assert_eq!(parsed.up().and_then(|u| u.up()).map(|u| u.kind()), Some(EntityKind::Environment));
    }
}

#[test]
fn test_illegal_containment_is_rejected() {
    let rt = CanonicalPath::builder().tenant("t").resource_type("rt").build().unwrap();
    assert!(matches!(rt.extend(EntityKind::Feed, "f"), Err(Error::InvalidPath(_))));
    assert!(CanonicalPath::builder().tenant("a").tenant("b").build().is_err());
    assert!("/e;e1".parse::<CanonicalPath>().is_err());
}
