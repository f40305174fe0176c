//! Entity creation, update and deletion.
//!
//! Each operation runs in one read-write transaction. The work itself only
//! collects notifications; they are published by
//! [`TraversalContext::commit`] once the transaction committed.

use std::ops::Deref;

use tracing::debug;
use uuid::Uuid;

use crate::model::*;
use crate::notify::{Action, Notification, Pending};
use crate::query::Filter;
use crate::storage::InventoryBackend;
use crate::tx::TxMode;
use crate::{Error, Result};

use super::context::TraversalContext;
use super::fetcher::{Read, Single};

/// Read access plus creation, update and deletion of `K` entities at the
/// current position.
pub struct ReadWrite<B: InventoryBackend, K: EntityType> {
    read: Read<B, K>,
}

impl<B: InventoryBackend, K: EntityType> Deref for ReadWrite<B, K> {
    type Target = Read<B, K>;

    fn deref(&self) -> &Read<B, K> {
        &self.read
    }
}

impl<B: InventoryBackend, K: EntityType> ReadWrite<B, K> {
    pub(crate) fn new(ctx: TraversalContext<B>) -> Self {
        Self { read: Read::new(ctx) }
    }

    fn ctx(&self) -> &TraversalContext<B> {
        &self.read.ctx
    }

    /// Create a `K` under the entity this view was reached from.
    ///
    /// Returns a view positioned at the new entity. Creation also relates
    /// the parent to it with `contains`, and wires up implied relationships
    /// (a resource type `defines` its resources, a metric type its metrics).
    pub async fn create(&self, blueprint: K::Blueprint) -> Result<Single<B, K>> {
        let blueprint: Blueprint = blueprint.into();
        let mut tx = self.ctx().begin(TxMode::ReadWrite).await?;
        let outcome = self.do_create(&mut tx, &blueprint).await;
        let path = self.ctx().commit(tx, outcome).await?;
        Ok(Single::new(self.ctx().replace_path(path)))
    }

    /// Replace the mutable fields of the entity with the given id.
    pub async fn update(&self, id: &str, update: Update) -> Result<()> {
        let mut tx = self.ctx().begin(TxMode::ReadWrite).await?;
        let outcome = self.do_update(&mut tx, id, &update).await;
        self.ctx().commit(tx, outcome).await
    }

    /// Delete the entity with the given id, detaching its relationships.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let mut tx = self.ctx().begin(TxMode::ReadWrite).await?;
        let outcome = self.do_delete(&mut tx, id).await;
        self.ctx().commit(tx, outcome).await
    }

    // ========================================================================
    // Transaction bodies
    // ========================================================================

    async fn do_create(&self, tx: &mut B::Tx, blueprint: &Blueprint) -> Result<Pending<CanonicalPath>> {
        let ctx = self.ctx();
        let backend = &ctx.backend;

        let parent = if K::KIND == EntityKind::Tenant {
            None
        } else {
            let handle = ctx.get_single(tx, ctx.source_path(), None).await?;
            let entity = backend.convert_entity(tx, &handle).await?;
            Some((handle, entity.path().clone()))
        };

        let id = match &parent {
            Some((_, environment)) if K::KIND == EntityKind::Feed => {
                ctx.config.feed_id_strategy().generate(environment, blueprint.proposed_id())
            }
            _ => blueprint
                .proposed_id()
                .map_or_else(|| Uuid::new_v4().to_string(), str::to_owned),
        };
        let path = match &parent {
            Some((_, parent_path)) => parent_path.extend(K::KIND, &id)?,
            None => CanonicalPath::tenant(&id)?,
        };

        match backend.find(tx, &path).await {
            Ok(_) => return Err(Error::EntityAlreadyExists(path.to_string())),
            Err(Error::ElementNotFound(_)) => {}
            Err(e) => return Err(e),
        }

        let handle = backend.persist(tx, &path, blueprint).await?;
        let entity = backend.convert_entity(tx, &handle).await?;
        let mut pending = Pending::new(path.clone()).with(Notification::entity(Action::Created, entity.clone()));

        if let Some((parent, _)) = &parent {
            let contains = backend
                .relate(tx, parent, &handle, WellKnown::Contains.as_str(), PropertyMap::new())
                .await?;
            let contains = backend.convert_relationship(tx, &contains).await?;
            pending.push(Notification::relationship(Action::Created, contains));
        }

        for rel in self.wire_up(tx, &entity, &handle).await? {
            pending.push(Notification::relationship(Action::Created, rel));
        }

        debug!(%path, "created entity");
        Ok(pending)
    }

    /// Relationships implied by the new entity's own fields.
    async fn wire_up(&self, tx: &mut B::Tx, entity: &Entity, handle: &B::Element) -> Result<Vec<Relationship>> {
        let definer = match entity {
            Entity::Resource(resource) => &resource.resource_type,
            Entity::Metric(metric) => &metric.metric_type,
            _ => return Ok(Vec::new()),
        };
        let backend = &self.ctx().backend;
        let definer_handle = match backend.find(tx, definer).await {
            Ok(h) => h,
            Err(Error::ElementNotFound(_)) => {
                return Err(Error::InvalidArgument(format!(
                    "{} '{}' does not exist in tenant '{}'",
                    definer.kind(),
                    definer.id(),
                    definer.tenant_id()
                )));
            }
            Err(e) => return Err(e),
        };
        let defines = backend
            .relate(tx, &definer_handle, handle, WellKnown::Defines.as_str(), PropertyMap::new())
            .await?;
        Ok(vec![backend.convert_relationship(tx, &defines).await?])
    }

    async fn locate(&self, tx: &B::Tx, id: &str) -> Result<B::Element> {
        let query = self.ctx().proceed().where_([Filter::id(id)]).get().query();
        self.ctx().get_single(tx, &query, Some(K::KIND)).await
    }

    async fn do_update(&self, tx: &mut B::Tx, id: &str, update: &Update) -> Result<Pending<()>> {
        let backend = &self.ctx().backend;
        let handle = self.locate(tx, id).await?;
        backend.update(tx, &handle, update).await?;
        let entity = backend.convert_entity(tx, &handle).await?;
        debug!(path = %entity.path(), "updated entity");
        Ok(Pending::new(()).with(Notification::entity(Action::Updated, entity)))
    }

    async fn do_delete(&self, tx: &mut B::Tx, id: &str) -> Result<Pending<()>> {
        let backend = &self.ctx().backend;
        let handle = self.locate(tx, id).await?;
        let entity = backend.convert_entity(tx, &handle).await?;

        let mut detached = Vec::new();
        for rel in backend.get_relationships(tx, &handle, Direction::Both, None).await? {
            detached.push(backend.convert_relationship(tx, &rel).await?);
        }

        backend.delete(tx, &handle).await?;
        debug!(path = %entity.path(), detached = detached.len(), "deleted entity");

        let mut pending = Pending::new(());
        for rel in detached {
            pending.push(Notification::relationship(Action::Deleted, rel));
        }
        Ok(pending.with(Notification::entity(Action::Deleted, entity)))
    }
}
