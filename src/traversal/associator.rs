//! Associations: well-known relationships between existing entities, such
//! as a resource owning a metric.

use std::ops::Deref;

use tracing::debug;

use crate::model::*;
use crate::notify::{Action, Notification, Pending};
use crate::query::{Filter, Query};
use crate::storage::InventoryBackend;
use crate::tx::TxMode;
use crate::{Error, Result};

use super::context::TraversalContext;
use super::fetcher::Read;

/// Read access to `K` entities associated with the source entity, plus
/// creating and removing such associations.
pub struct ReadAssociate<B: InventoryBackend, K: EntityType> {
    read: Read<B, K>,
    source_kind: EntityKind,
    relationship: WellKnown,
}

impl<B: InventoryBackend, K: EntityType> Deref for ReadAssociate<B, K> {
    type Target = Read<B, K>;

    fn deref(&self) -> &Read<B, K> {
        &self.read
    }
}

impl<B: InventoryBackend, K: EntityType> ReadAssociate<B, K> {
    pub(crate) fn new(ctx: TraversalContext<B>, source_kind: EntityKind, relationship: WellKnown) -> Self {
        Self { read: Read::new(ctx), source_kind, relationship }
    }

    fn ctx(&self) -> &TraversalContext<B> {
        &self.read.ctx
    }

    fn source_query(&self) -> Query {
        self.ctx()
            .source_path()
            .extend()
            .filter()
            .with([Filter::kind(self.source_kind)])
            .build()
    }

    /// Relate the source entity to the `K` at `target`.
    pub async fn associate(&self, target: &CanonicalPath) -> Result<Relationship> {
        let mut tx = self.ctx().begin(TxMode::ReadWrite).await?;
        let outcome = self.do_associate(&mut tx, target).await;
        self.ctx().commit(tx, outcome).await
    }

    /// Remove the association with the `K` at `target`.
    pub async fn disassociate(&self, target: &CanonicalPath) -> Result<Relationship> {
        let mut tx = self.ctx().begin(TxMode::ReadWrite).await?;
        let outcome = self.do_disassociate(&mut tx, target).await;
        self.ctx().commit(tx, outcome).await
    }

    /// The association with the associated `K` whose id is `id`.
    ///
    /// An association hidden by the result filter is reported as not found.
    pub async fn association(&self, id: &str) -> Result<Relationship> {
        let tx = self.ctx().begin(TxMode::ReadOnly).await?;
        let outcome = self.lookup(&tx, id).await;
        self.ctx().finish_read(tx, outcome).await
    }

    // ========================================================================
    // Transaction bodies
    // ========================================================================

    async fn target(&self, tx: &B::Tx, path: &CanonicalPath) -> Result<B::Element> {
        if path.kind() != K::KIND {
            return Err(Error::InvalidArgument(format!(
                "a {} cannot be associated as {} by '{}'",
                path.kind(),
                K::KIND,
                self.relationship
            )));
        }
        self.ctx().find_entity(tx, path).await
    }

    async fn do_associate(&self, tx: &mut B::Tx, target: &CanonicalPath) -> Result<Pending<Relationship>> {
        let ctx = self.ctx();
        let query = self.source_query();
        let source = ctx.get_single(tx, &query, Some(self.source_kind)).await?;
        let target_handle = self.target(tx, target).await?;

        let source_path = ctx.backend.convert_entity(tx, &source).await?.path().clone();
        if source_path.tenant_id() != target.tenant_id() {
            return Err(Error::InvalidArgument(format!(
                "cannot associate '{source_path}' with '{target}' across tenants"
            )));
        }

        let name = self.relationship.as_str();
        if ctx.backend.has_relationship(tx, &source, &target_handle, name).await? {
            return Err(Error::RelationAlreadyExists(format!("{source_path} --{name}--> {target}")));
        }

        let handle = ctx.backend.relate(tx, &source, &target_handle, name, PropertyMap::new()).await?;
        let rel = ctx.backend.convert_relationship(tx, &handle).await?;
        debug!(%rel, "associated");
        Ok(Pending::new(rel.clone()).with(Notification::relationship(Action::Created, rel)))
    }

    async fn do_disassociate(&self, tx: &mut B::Tx, target: &CanonicalPath) -> Result<Pending<Relationship>> {
        let ctx = self.ctx();
        let query = self.source_query();
        let source = ctx.get_single(tx, &query, Some(self.source_kind)).await?;
        let target_handle = self.target(tx, target).await?;

        let name = self.relationship.as_str();
        let handle = match ctx.backend.get_relationship(tx, &source, &target_handle, name).await {
            Ok(h) => h,
            Err(Error::ElementNotFound(_)) => {
                return Err(Error::RelationNotFound(format!("{name} from {query} to {target}")));
            }
            Err(e) => return Err(e),
        };
        let rel = ctx.backend.convert_relationship(tx, &handle).await?;
        ctx.backend.delete(tx, &handle).await?;
        debug!(%rel, "disassociated");
        Ok(Pending::new(rel.clone()).with(Notification::relationship(Action::Deleted, rel)))
    }

    async fn lookup(&self, tx: &B::Tx, id: &str) -> Result<Relationship> {
        let ctx = self.ctx();
        let query = self.source_query();
        let source = ctx.get_single(tx, &query, Some(self.source_kind)).await?;

        let target_query = query
            .extend()
            .path()
            .with([Filter::related(self.relationship, Direction::Outgoing)])
            .filter()
            .with([Filter::kind(K::KIND), Filter::id(id)])
            .build();
        let target = ctx.get_single(tx, &target_query, Some(K::KIND)).await?;

        let name = self.relationship.as_str();
        let handle = match ctx.backend.get_relationship(tx, &source, &target, name).await {
            Ok(h) => h,
            Err(Error::ElementNotFound(_)) => {
                return Err(Error::RelationNotFound(format!("{name} from {query} to {} '{id}'", K::KIND)));
            }
            Err(e) => return Err(e),
        };
        let rel = ctx.backend.convert_relationship(tx, &handle).await?;
        if !ctx.is_applicable(&Element::Relationship(rel.clone())) {
            return Err(Error::RelationNotFound(format!("{name} from {query} to {} '{id}'", K::KIND)));
        }
        Ok(rel)
    }
}
