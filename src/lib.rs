//! # infra-inventory: Inventory of Infrastructure
//!
//! A hierarchical graph of typed entities (tenants, environments, feeds,
//! resource types, resources, metric types, metrics) connected by named,
//! directed relationships, over pluggable storage.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `InventoryBackend` is the contract between the traversal engine and storage
//! 2. **Clean DTOs**: `Entity`, `Relationship`, `CanonicalPath`, `Value` cross all boundaries
//! 3. **Queries are values**: fluent calls compose immutable `Query` trees; backends evaluate them
//! 4. **Notify after commit**: mutations return pending events, published only once committed
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use infra_inventory::*;
//!
//! # async fn example() -> infra_inventory::Result<()> {
//! let inventory = Inventory::open_memory().await?;
//!
//! let acme = inventory.tenants().create(TenantBlueprint::new("acme")).await?;
//! let prod = acme.environments().create(EnvironmentBlueprint::new("prod")).await?;
//! acme.resource_types().create(ResourceTypeBlueprint::new("server", "1.0")).await?;
//!
//! let web = prod
//!     .feedless_resources()
//!     .create(ResourceBlueprint::new("web-1", "server"))
//!     .await?
//!     .entity()
//!     .await?;
//! println!("{}", web.path);
//! # Ok(())
//! # }
//! ```
//!
//! ## Storage Backends
//!
//! | Backend | Description |
//! |---------|-------------|
//! | Memory | In-memory snapshot store for testing/embedding |
//! | External | Any `InventoryBackend` implementation, via [`Inventory::with_config`] |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod query;
pub mod storage;
pub mod tx;
pub mod traversal;
pub mod notify;
pub mod config;

use std::sync::Arc;

use tracing::debug;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    CanonicalPath, Segment, Entity, EntityKind, EntityType, MetricUnit,
    Tenant, Environment, Feed, ResourceType, Resource, MetricType, Metric,
    Relationship, Direction, WellKnown, Element, ElementKind, ElementVisitor,
    Blueprint, Update, TenantBlueprint, EnvironmentBlueprint, FeedBlueprint,
    ResourceTypeBlueprint, ResourceBlueprint, MetricTypeBlueprint, MetricBlueprint,
    Value, PropertyMap, properties,
};

// ============================================================================
// Re-exports: Query, Storage, Transactions
// ============================================================================

pub use query::{Filter, Page, Pager, Query};
pub use storage::{InventoryBackend, BackendConfig, MemoryBackend};
pub use tx::{Transaction, TxMode, TxId};

// ============================================================================
// Re-exports: Traversal, Notification, Configuration
// ============================================================================

pub use traversal::{Multiple, Read, ReadAssociate, ReadWrite, Relationships, Single, TraversalContext};
pub use notify::{Action, Interest, Notification, SubscriptionId};
pub use config::{Configuration, FeedIdStrategy, ProposedOrRandomFeedIds, ResultFilter};

// ============================================================================
// Top-level Inventory handle
// ============================================================================

/// The primary entry point. An `Inventory` wraps a storage backend and
/// hands out fluent traversals over it.
pub struct Inventory<B: InventoryBackend> {
    backend: Arc<B>,
    config: Arc<Configuration>,
    notifier: Arc<notify::Notifier>,
}

impl<B: InventoryBackend> Inventory<B> {
    /// Create an Inventory with the given backend and default configuration.
    pub fn with_backend(backend: B) -> Self {
        Self::with_config(backend, Configuration::default())
    }

    pub fn with_config(backend: B, config: Configuration) -> Self {
        Self {
            backend: Arc::new(backend),
            config: Arc::new(config),
            notifier: Arc::new(notify::Notifier::new()),
        }
    }

    /// All tenants; the root of every traversal.
    pub fn tenants(&self) -> ReadWrite<B, Tenant> {
        ReadWrite::new(TraversalContext::tenants(
            Arc::clone(&self.backend),
            Arc::clone(&self.config),
            Arc::clone(&self.notifier),
        ))
    }

    /// Call `callback` for every committed event matching `interest`.
    pub fn observe<F>(&self, interest: Interest, callback: F) -> SubscriptionId
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        self.notifier.subscribe(interest, callback)
    }

    pub fn unobserve(&self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }

    pub fn has_observers(&self, interest: &Interest) -> bool {
        self.notifier.is_observed(interest)
    }

    pub fn configuration(&self) -> &Configuration {
        &self.config
    }

    /// Access the underlying backend (for advanced use).
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub async fn close(&self) -> Result<()> {
        debug!("closing inventory");
        self.backend.close().await
    }
}

/// In-memory inventory for testing and embedding.
impl Inventory<MemoryBackend> {
    pub async fn open_memory() -> Result<Self> {
        Self::open(Configuration::default()).await
    }

    /// Open the built-in backend `config` names.
    pub async fn open(config: Configuration) -> Result<Self> {
        match config.backend() {
            BackendConfig::Memory => Ok(Self::with_config(MemoryBackend::new(), config)),
            BackendConfig::External { name } => Err(Error::StorageError(format!(
                "'{name}' is not a built-in backend; construct it and use Inventory::with_config"
            ))),
        }
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid canonical path: {0}")]
    InvalidPath(String),

    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    #[error("Entity already exists: {0}")]
    EntityAlreadyExists(String),

    #[error("Relationship not found: {0}")]
    RelationNotFound(String),

    #[error("Relationship already exists: {0}")]
    RelationAlreadyExists(String),

    /// Backend-level miss; never returned from the fluent API.
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Transaction conflict: {0}")]
    Conflict(String),

    #[error("Transaction error: {0}")]
    TxError(String),

    #[error("Storage error: {0}")]
    StorageError(String),
}

pub type Result<T> = std::result::Result<T, Error>;
