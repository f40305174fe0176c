//! End-to-end tests for transaction discipline: rollback on failure,
//! commit-before-notify, and concurrent writers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use infra_inventory::storage::{MemoryElement, MemoryTx};
use infra_inventory::*;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

// ============================================================================
// Helper: a backend that delegates to MemoryBackend and can fail commits.
// ============================================================================

#[derive(Default)]
struct FlakyBackend {
    inner: MemoryBackend,
    fail_commits: AtomicBool,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
}

#[async_trait]
impl InventoryBackend for FlakyBackend {
    type Tx = MemoryTx;
    type Element = MemoryElement;

    async fn begin_tx(&self, mode: TxMode) -> Result<MemoryTx> {
        self.inner.begin_tx(mode).await
    }

    async fn commit_tx(&self, tx: MemoryTx) -> Result<()> {
        if self.fail_commits.load(Ordering::SeqCst) {
            self.inner.rollback_tx(tx).await?;
            return Err(Error::StorageError("injected commit failure".into()));
        }
        self.commits.fetch_add(1, Ordering::SeqCst);
        self.inner.commit_tx(tx).await
    }

    async fn rollback_tx(&self, tx: MemoryTx) -> Result<()> {
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
        self.inner.rollback_tx(tx).await
    }

    async fn query(&self, tx: &MemoryTx, query: &Query, pager: &Pager) -> Result<Page<MemoryElement>> {
        self.inner.query(tx, query, pager).await
    }

    async fn find(&self, tx: &MemoryTx, path: &CanonicalPath) -> Result<MemoryElement> {
        self.inner.find(tx, path).await
    }

    async fn find_relationship(&self, tx: &MemoryTx, id: &str) -> Result<MemoryElement> {
        self.inner.find_relationship(tx, id).await
    }

    async fn get_relationship(
        &self,
        tx: &MemoryTx,
        source: &MemoryElement,
        target: &MemoryElement,
        name: &str,
    ) -> Result<MemoryElement> {
        self.inner.get_relationship(tx, source, target, name).await
    }

    async fn get_relationships(
        &self,
        tx: &MemoryTx,
        element: &MemoryElement,
        direction: Direction,
        name: Option<&str>,
    ) -> Result<Vec<MemoryElement>> {
        self.inner.get_relationships(tx, element, direction, name).await
    }

    async fn persist(&self, tx: &mut MemoryTx, path: &CanonicalPath, blueprint: &Blueprint) -> Result<MemoryElement> {
        self.inner.persist(tx, path, blueprint).await
    }

    async fn relate(
        &self,
        tx: &mut MemoryTx,
        source: &MemoryElement,
        target: &MemoryElement,
        name: &str,
        properties: PropertyMap,
    ) -> Result<MemoryElement> {
        self.inner.relate(tx, source, target, name, properties).await
    }

    async fn delete(&self, tx: &mut MemoryTx, element: &MemoryElement) -> Result<()> {
        self.inner.delete(tx, element).await
    }

    async fn update(&self, tx: &mut MemoryTx, element: &MemoryElement, update: &Update) -> Result<()> {
        self.inner.update(tx, element, update).await
    }

    fn extract_id(&self, element: &MemoryElement) -> String {
        self.inner.extract_id(element)
    }

    fn extract_type(&self, element: &MemoryElement) -> ElementKind {
        self.inner.extract_type(element)
    }

    async fn convert(&self, tx: &MemoryTx, element: &MemoryElement, kind: ElementKind) -> Result<Element> {
        self.inner.convert(tx, element, kind).await
    }

    async fn close(&self) -> Result<()> {
        self.inner.close().await
    }
}

fn counter(inventory: &Inventory<FlakyBackend>) -> Arc<AtomicUsize> {
    let count = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&count);
    for kind in EntityKind::ALL {
        let sink = Arc::clone(&sink);
        inventory.observe(Interest::new(kind, Action::Created), move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
        });
    }
    count
}

// ============================================================================
// 1. Commit and rollback
// ============================================================================

#[tokio::test]
async fn test_failed_commit_publishes_nothing() {
    let inventory = Inventory::with_backend(FlakyBackend::default());
    let published = counter(&inventory);

    inventory.backend().fail_commits.store(true, Ordering::SeqCst);
    let err = inventory.tenants().create(TenantBlueprint::new("t1")).await.err().unwrap();
    assert!(matches!(err, Error::StorageError(_)));
    assert_eq!(published.load(Ordering::SeqCst), 0);
    assert_eq!(inventory.backend().inner.entity_count(), 0);

    inventory.backend().fail_commits.store(false, Ordering::SeqCst);
    inventory.tenants().create(TenantBlueprint::new("t1")).await.unwrap();
    assert_eq!(published.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failure_inside_transaction_rolls_back() {
    let inventory = Inventory::with_backend(FlakyBackend::default());
    let t1 = inventory.tenants().create(TenantBlueprint::new("t1")).await.unwrap();
    let e1 = t1.environments().create(EnvironmentBlueprint::new("e1")).await.unwrap();
    let rollbacks = inventory.backend().rollbacks.load(Ordering::SeqCst);

    let err = e1
        .feedless_resources()
        .create(ResourceBlueprint::new("orphan", "missing-type"))
        .await
        .err()
        .unwrap();

    assert!(matches!(err, Error::InvalidArgument(_)));
    assert_eq!(inventory.backend().rollbacks.load(Ordering::SeqCst), rollbacks + 1);
    // No orphan entity, no dangling contains.
    assert_eq!(inventory.backend().inner.entity_count(), 2);
    assert_eq!(inventory.backend().inner.relationship_count(), 1);
}

#[tokio::test]
async fn test_reads_commit_and_failed_reads_roll_back() {
    let inventory = Inventory::with_backend(FlakyBackend::default());
    inventory.tenants().create(TenantBlueprint::new("t1")).await.unwrap();
    let (commits, rollbacks) = (
        inventory.backend().commits.load(Ordering::SeqCst),
        inventory.backend().rollbacks.load(Ordering::SeqCst),
    );

    inventory.tenants().get("t1").entity().await.unwrap();
    assert_eq!(inventory.backend().commits.load(Ordering::SeqCst), commits + 1);

    assert!(inventory.tenants().get("t2").entity().await.is_err());
    assert_eq!(inventory.backend().rollbacks.load(Ordering::SeqCst), rollbacks + 1);
}

// ============================================================================
// 2. Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_disjoint_creates_all_succeed() {
    let inventory = Arc::new(Inventory::open_memory().await.unwrap());

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let inventory = Arc::clone(&inventory);
            tokio::spawn(async move {
                let t = inventory.tenants().create(TenantBlueprint::new(format!("t{i}"))).await?;
                t.environments().create(EnvironmentBlueprint::new("e")).await?;
                Ok::<_, Error>(())
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let tenants = inventory.tenants().all().entities(&Pager::unlimited()).await.unwrap();
    assert_eq!(tenants.total, 16);
    assert_eq!(inventory.backend().relationship_count(), 16);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_identical_creates_have_one_winner() {
    let inventory = Arc::new(Inventory::open_memory().await.unwrap());
    let published = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&published);
    inventory.observe(Interest::new(EntityKind::Tenant, Action::Created), move |n| {
        sink.lock().push(n.to_string());
    });

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let inventory = Arc::clone(&inventory);
            tokio::spawn(async move { inventory.tenants().create(TenantBlueprint::new("same")).await.map(|_| ()) })
        })
        .collect();

    let mut wins = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(()) => wins += 1,
            Err(Error::EntityAlreadyExists(_) | Error::Conflict(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(wins, 1);
    assert_eq!(inventory.backend().entity_count(), 1);
    assert_eq!(published.lock().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_identical_associations_have_one_winner() {
    let inventory = Arc::new(Inventory::open_memory().await.unwrap());
    let t1 = inventory.tenants().create(TenantBlueprint::new("t1")).await.unwrap();
    t1.resource_types().create(ResourceTypeBlueprint::new("rt", "1")).await.unwrap();
    t1.metric_types().create(MetricTypeBlueprint::new("mt", MetricUnit::None)).await.unwrap();
    let rels_before = inventory.backend().relationship_count();
    let mt: CanonicalPath = "/t;t1/mt;mt".parse().unwrap();

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let inventory = Arc::clone(&inventory);
            let mt = mt.clone();
            tokio::spawn(async move {
                inventory.tenants().get("t1").resource_types().get("rt").metric_types().associate(&mt).await
            })
        })
        .collect();

    let mut wins = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => wins += 1,
            Err(Error::RelationAlreadyExists(_) | Error::Conflict(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(wins, 1);
    assert_eq!(inventory.backend().relationship_count(), rels_before + 1);
}
