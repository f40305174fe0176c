//! Read-side views: [`Read`], [`Single`], [`Multiple`], and the per-kind
//! navigation between them.

use std::fmt;
use std::marker::PhantomData;

use crate::model::*;
use crate::query::{Filter, Page, Pager};
use crate::storage::InventoryBackend;
use crate::tx::TxMode;
use crate::{Error, Result};

use super::associator::ReadAssociate;
use super::context::TraversalContext;
use super::mutator::ReadWrite;
use super::relationships::Relationships;

/// Narrow a converted element to the entity struct `K`.
pub(crate) fn into_typed<K: EntityType>(element: Element) -> Result<K> {
    match element {
        Element::Entity(entity) => {
            let found = entity.kind();
            K::from_entity(entity)
                .ok_or_else(|| Error::InvalidArgument(format!("expected a {}, found a {found}", K::KIND)))
        }
        Element::Relationship(rel) => Err(Error::InvalidArgument(format!(
            "expected a {}, found relationship '{}'",
            K::KIND,
            rel.id
        ))),
    }
}

// ============================================================================
// Read
// ============================================================================

/// Entities of kind `K` reachable from the current position.
pub struct Read<B: InventoryBackend, K: EntityType> {
    pub(crate) ctx: TraversalContext<B>,
    _kind: PhantomData<fn() -> K>,
}

impl<B: InventoryBackend, K: EntityType> Read<B, K> {
    pub(crate) fn new(ctx: TraversalContext<B>) -> Self {
        Self { ctx, _kind: PhantomData }
    }

    pub fn context(&self) -> &TraversalContext<B> {
        &self.ctx
    }

    /// The entity with the given id.
    pub fn get(&self, id: &str) -> Single<B, K> {
        Single::new(self.ctx.proceed().where_([Filter::id(id)]).get())
    }

    /// Entities matching any of the AND-groups.
    pub fn get_all(&self, groups: &[Vec<Filter>]) -> Multiple<B, K> {
        Multiple::new(self.ctx.proceed().where_all(groups).get())
    }

    pub fn all(&self) -> Multiple<B, K> {
        Multiple::new(self.ctx.clone())
    }
}

impl<B: InventoryBackend, K: EntityType> fmt::Debug for Read<B, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Read<{}>({})", K::KIND, self.ctx.query())
    }
}

// ============================================================================
// Single
// ============================================================================

/// At most one entity of kind `K`.
pub struct Single<B: InventoryBackend, K: EntityType> {
    pub(crate) ctx: TraversalContext<B>,
    _kind: PhantomData<fn() -> K>,
}

impl<B: InventoryBackend, K: EntityType> Single<B, K> {
    pub(crate) fn new(ctx: TraversalContext<B>) -> Self {
        Self { ctx, _kind: PhantomData }
    }

    pub fn context(&self) -> &TraversalContext<B> {
        &self.ctx
    }

    /// Load the entity, or fail with [`Error::EntityNotFound`].
    pub async fn entity(&self) -> Result<K> {
        let tx = self.ctx.begin(TxMode::ReadOnly).await?;
        let outcome = self.load(&tx).await;
        self.ctx.finish_read(tx, outcome).await
    }

    pub async fn exists(&self) -> Result<bool> {
        match self.entity().await {
            Ok(_) => Ok(true),
            Err(Error::EntityNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Relationships of this entity in the given direction.
    pub fn relationships(&self, direction: Direction) -> Relationships<B> {
        Relationships::new(self.ctx.clone(), direction)
    }

    async fn load(&self, tx: &B::Tx) -> Result<K> {
        let query = self.ctx.query();
        let handle = self.ctx.get_single(tx, &query, Some(K::KIND)).await?;
        let element = Element::Entity(self.ctx.backend.convert_entity(tx, &handle).await?);
        if !self.ctx.is_applicable(&element) {
            return Err(Error::EntityNotFound(format!("no {} at {query}", K::KIND)));
        }
        into_typed(element)
    }

    fn contained<C: EntityType>(&self) -> TraversalContext<B> {
        self.ctx.proceed_to(WellKnown::Contains, C::KIND)
    }
}

// ============================================================================
// Multiple
// ============================================================================

/// Any number of entities of kind `K`.
pub struct Multiple<B: InventoryBackend, K: EntityType> {
    pub(crate) ctx: TraversalContext<B>,
    _kind: PhantomData<fn() -> K>,
}

impl<B: InventoryBackend, K: EntityType> Multiple<B, K> {
    pub(crate) fn new(ctx: TraversalContext<B>) -> Self {
        Self { ctx, _kind: PhantomData }
    }

    pub fn context(&self) -> &TraversalContext<B> {
        &self.ctx
    }

    /// One page of the entities, ordered by canonical path.
    ///
    /// Entities hidden by the result filter are dropped from the page and
    /// from its total.
    pub async fn entities(&self, pager: &Pager) -> Result<Page<K>> {
        let tx = self.ctx.begin(TxMode::ReadOnly).await?;
        let outcome = self.load(&tx, pager).await;
        self.ctx.finish_read(tx, outcome).await
    }

    async fn load(&self, tx: &B::Tx, pager: &Pager) -> Result<Page<K>> {
        let page = self.ctx.backend.query(tx, &self.ctx.query(), pager).await?;
        let total = page.total;
        let mut items = Vec::with_capacity(page.len());
        let mut hidden = 0;
        for handle in page {
            let element = Element::Entity(self.ctx.backend.convert_entity(tx, &handle).await?);
            if self.ctx.is_applicable(&element) {
                items.push(into_typed(element)?);
            } else {
                hidden += 1;
            }
        }
        Ok(Page { items, total: total - hidden })
    }

    fn contained<C: EntityType>(&self) -> Read<B, C> {
        Read::new(self.ctx.proceed_to(WellKnown::Contains, C::KIND))
    }
}

// ============================================================================
// Navigation
// ============================================================================

impl<B: InventoryBackend> Single<B, Tenant> {
    pub fn environments(&self) -> ReadWrite<B, Environment> {
        ReadWrite::new(self.contained::<Environment>())
    }

    pub fn resource_types(&self) -> ReadWrite<B, ResourceType> {
        ReadWrite::new(self.contained::<ResourceType>())
    }

    pub fn metric_types(&self) -> ReadWrite<B, MetricType> {
        ReadWrite::new(self.contained::<MetricType>())
    }
}

impl<B: InventoryBackend> Single<B, Environment> {
    pub fn feeds(&self) -> ReadWrite<B, Feed> {
        ReadWrite::new(self.contained::<Feed>())
    }

    /// Resources created directly in the environment, outside any feed.
    pub fn feedless_resources(&self) -> ReadWrite<B, Resource> {
        ReadWrite::new(self.contained::<Resource>())
    }

    pub fn feedless_metrics(&self) -> ReadWrite<B, Metric> {
        ReadWrite::new(self.contained::<Metric>())
    }
}

impl<B: InventoryBackend> Single<B, Feed> {
    pub fn resources(&self) -> ReadWrite<B, Resource> {
        ReadWrite::new(self.contained::<Resource>())
    }

    pub fn metrics(&self) -> ReadWrite<B, Metric> {
        ReadWrite::new(self.contained::<Metric>())
    }
}

impl<B: InventoryBackend> Single<B, Resource> {
    /// Metrics the resource owns.
    pub fn metrics(&self) -> ReadAssociate<B, Metric> {
        ReadAssociate::new(
            self.ctx.proceed_to(WellKnown::Owns, EntityKind::Metric),
            EntityKind::Resource,
            WellKnown::Owns,
        )
    }
}

impl<B: InventoryBackend> Single<B, ResourceType> {
    /// Metric types the resource type owns.
    pub fn metric_types(&self) -> ReadAssociate<B, MetricType> {
        ReadAssociate::new(
            self.ctx.proceed_to(WellKnown::Owns, EntityKind::MetricType),
            EntityKind::ResourceType,
            WellKnown::Owns,
        )
    }

    /// Resources of this type.
    pub fn resources(&self) -> Read<B, Resource> {
        Read::new(self.ctx.proceed_to(WellKnown::Defines, EntityKind::Resource))
    }
}

impl<B: InventoryBackend> Single<B, MetricType> {
    /// Metrics of this type.
    pub fn metrics(&self) -> Read<B, Metric> {
        Read::new(self.ctx.proceed_to(WellKnown::Defines, EntityKind::Metric))
    }
}

impl<B: InventoryBackend> Multiple<B, Tenant> {
    pub fn environments(&self) -> Read<B, Environment> {
        self.contained()
    }

    pub fn resource_types(&self) -> Read<B, ResourceType> {
        self.contained()
    }

    pub fn metric_types(&self) -> Read<B, MetricType> {
        self.contained()
    }
}

impl<B: InventoryBackend> Multiple<B, Environment> {
    pub fn feeds(&self) -> Read<B, Feed> {
        self.contained()
    }

    pub fn feedless_resources(&self) -> Read<B, Resource> {
        self.contained()
    }

    pub fn feedless_metrics(&self) -> Read<B, Metric> {
        self.contained()
    }
}

impl<B: InventoryBackend> Multiple<B, Feed> {
    pub fn resources(&self) -> Read<B, Resource> {
        self.contained()
    }

    pub fn metrics(&self) -> Read<B, Metric> {
        self.contained()
    }
}

impl<B: InventoryBackend> Multiple<B, Resource> {
    pub fn metrics(&self) -> Read<B, Metric> {
        Read::new(self.ctx.proceed_to(WellKnown::Owns, EntityKind::Metric))
    }
}

impl<B: InventoryBackend> Multiple<B, ResourceType> {
    pub fn metric_types(&self) -> Read<B, MetricType> {
        Read::new(self.ctx.proceed_to(WellKnown::Owns, EntityKind::MetricType))
    }

    pub fn resources(&self) -> Read<B, Resource> {
        Read::new(self.ctx.proceed_to(WellKnown::Defines, EntityKind::Resource))
    }
}

impl<B: InventoryBackend> Multiple<B, MetricType> {
    pub fn metrics(&self) -> Read<B, Metric> {
        Read::new(self.ctx.proceed_to(WellKnown::Defines, EntityKind::Metric))
    }
}
