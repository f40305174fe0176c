//! Relationships of one entity, seen in one direction.

use tracing::debug;

use crate::model::*;
use crate::notify::{Action, Notification, Pending};
use crate::storage::InventoryBackend;
use crate::tx::TxMode;
use crate::{Error, Result};

use super::context::TraversalContext;

/// Browse and edit the relationships of the entity a [`Single`] points at.
///
/// [`Single`]: super::Single
pub struct Relationships<B: InventoryBackend> {
    ctx: TraversalContext<B>,
    direction: Direction,
}

impl<B: InventoryBackend> Relationships<B> {
    pub(crate) fn new(ctx: TraversalContext<B>, direction: Direction) -> Self {
        Self { ctx, direction }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub async fn all(&self) -> Result<Vec<Relationship>> {
        self.list(None).await
    }

    pub async fn named(&self, name: &str) -> Result<Vec<Relationship>> {
        self.list(Some(name)).await
    }

    /// The relationship with the given id, if it touches the entity in this
    /// direction.
    pub async fn get(&self, id: &str) -> Result<Relationship> {
        let tx = self.ctx.begin(TxMode::ReadOnly).await?;
        let outcome = self.read_one(&tx, id).await;
        self.ctx.finish_read(tx, outcome).await
    }

    /// Create a custom relationship between this entity and `other`.
    ///
    /// Outgoing views make this entity the source, incoming views the
    /// target. Well-known names exist at most once per ordered pair, and a
    /// new `contains` can only come from creating the contained entity.
    pub async fn link_with(
        &self,
        name: &str,
        other: &CanonicalPath,
        properties: PropertyMap,
    ) -> Result<Relationship> {
        if self.direction == Direction::Both {
            return Err(Error::InvalidArgument("cannot link in both directions at once".into()));
        }
        let mut tx = self.ctx.begin(TxMode::ReadWrite).await?;
        let outcome = self.do_link(&mut tx, name, other, properties).await;
        self.ctx.commit(tx, outcome).await
    }

    pub async fn update(&self, id: &str, update: Update) -> Result<()> {
        let mut tx = self.ctx.begin(TxMode::ReadWrite).await?;
        let outcome = self.do_update(&mut tx, id, &update).await;
        self.ctx.commit(tx, outcome).await
    }

    /// Delete a relationship. `contains` cannot be deleted on its own.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let mut tx = self.ctx.begin(TxMode::ReadWrite).await?;
        let outcome = self.do_delete(&mut tx, id).await;
        self.ctx.commit(tx, outcome).await
    }

    // ========================================================================
    // Transaction bodies
    // ========================================================================

    async fn entity(&self, tx: &B::Tx) -> Result<B::Element> {
        self.ctx.get_single(tx, &self.ctx.query(), None).await
    }

    async fn list(&self, name: Option<&str>) -> Result<Vec<Relationship>> {
        let tx = self.ctx.begin(TxMode::ReadOnly).await?;
        let outcome = self.read_many(&tx, name).await;
        self.ctx.finish_read(tx, outcome).await
    }

    async fn read_many(&self, tx: &B::Tx, name: Option<&str>) -> Result<Vec<Relationship>> {
        let entity = self.entity(tx).await?;
        let mut rels = Vec::new();
        for handle in self.ctx.backend.get_relationships(tx, &entity, self.direction, name).await? {
            let rel = self.ctx.backend.convert_relationship(tx, &handle).await?;
            if self.ctx.is_applicable(&Element::Relationship(rel.clone())) {
                rels.push(rel);
            }
        }
        Ok(rels)
    }

    async fn read_one(&self, tx: &B::Tx, id: &str) -> Result<Relationship> {
        let (_, rel) = self.owned(tx, id).await?;
        if self.ctx.is_applicable(&Element::Relationship(rel.clone())) {
            Ok(rel)
        } else {
            Err(Error::RelationNotFound(id.to_owned()))
        }
    }

    /// The relationship `id`, checked to touch this entity in our direction.
    async fn owned(&self, tx: &B::Tx, id: &str) -> Result<(B::Element, Relationship)> {
        let entity = self.entity(tx).await?;
        let at = self.ctx.backend.convert_entity(tx, &entity).await?.path().clone();
        let handle = match self.ctx.backend.find_relationship(tx, id).await {
            Ok(h) => h,
            Err(Error::ElementNotFound(_)) => return Err(Error::RelationNotFound(id.to_owned())),
            Err(e) => return Err(e),
        };
        let rel = self.ctx.backend.convert_relationship(tx, &handle).await?;
        if !rel.touches(&at, self.direction) {
            return Err(Error::RelationNotFound(format!("{id} ({:?} of {at})", self.direction)));
        }
        Ok((handle, rel))
    }

    async fn do_link(
        &self,
        tx: &mut B::Tx,
        name: &str,
        other: &CanonicalPath,
        properties: PropertyMap,
    ) -> Result<Pending<Relationship>> {
        let backend = &self.ctx.backend;
        let this = self.entity(tx).await?;
        let other = self.ctx.find_entity(tx, other).await?;
        let (source, target) = match self.direction {
            Direction::Incoming => (&other, &this),
            _ => (&this, &other),
        };

        if WellKnown::is_well_known(name) && backend.has_relationship(tx, source, target, name).await? {
            let (s, t) = (backend.extract_id(source), backend.extract_id(target));
            return Err(Error::RelationAlreadyExists(format!("{s} --{name}--> {t}")));
        }
        if name == WellKnown::Contains.as_str() {
            return Err(Error::InvalidArgument(
                "'contains' relationships are created together with the contained entity".into(),
            ));
        }

        let handle = backend.relate(tx, source, target, name, properties).await?;
        let rel = backend.convert_relationship(tx, &handle).await?;
        debug!(%rel, "linked");
        Ok(Pending::new(rel.clone()).with(Notification::relationship(Action::Created, rel)))
    }

    async fn do_update(&self, tx: &mut B::Tx, id: &str, update: &Update) -> Result<Pending<()>> {
        let (handle, _) = self.owned(tx, id).await?;
        self.ctx.backend.update(tx, &handle, update).await?;
        let rel = self.ctx.backend.convert_relationship(tx, &handle).await?;
        Ok(Pending::new(()).with(Notification::relationship(Action::Updated, rel)))
    }

    async fn do_delete(&self, tx: &mut B::Tx, id: &str) -> Result<Pending<()>> {
        let (handle, rel) = self.owned(tx, id).await?;
        if rel.name == WellKnown::Contains.as_str() {
            return Err(Error::InvalidArgument(format!(
                "'contains' relationship {id} can only be removed by deleting '{}'",
                rel.target
            )));
        }
        self.ctx.backend.delete(tx, &handle).await?;
        debug!(%rel, "unlinked");
        Ok(Pending::new(()).with(Notification::relationship(Action::Deleted, rel)))
    }
}
