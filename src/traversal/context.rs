//! Traversal context: where a fluent chain currently stands.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::config::Configuration;
use crate::model::{CanonicalPath, Direction, Element, EntityKind, WellKnown};
use crate::notify::{Notifier, Pending};
use crate::query::{Filter, Pager, Query, QueryBuilder};
use crate::storage::InventoryBackend;
use crate::tx::{Transaction, TxMode};
use crate::{Error, Result};

/// Immutable position of a traversal.
///
/// `source_path` reaches the entities the traversal started from (the
/// parent of anything created here). `select_candidates` is applied on top
/// of it to reach the current candidates. Every repositioning returns a new
/// context, so one context can be branched freely from several tasks.
pub struct TraversalContext<B: InventoryBackend> {
    pub(crate) backend: Arc<B>,
    source_path: Query,
    select_candidates: Query,
    pub(crate) config: Arc<Configuration>,
    pub(crate) notifier: Arc<Notifier>,
}

impl<B: InventoryBackend> Clone for TraversalContext<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            source_path: self.source_path.clone(),
            select_candidates: self.select_candidates.clone(),
            config: Arc::clone(&self.config),
            notifier: Arc::clone(&self.notifier),
        }
    }
}

impl<B: InventoryBackend> TraversalContext<B> {
    /// Context selecting all tenants.
    pub(crate) fn tenants(backend: Arc<B>, config: Arc<Configuration>, notifier: Arc<Notifier>) -> Self {
        Self {
            backend,
            source_path: Query::empty(),
            select_candidates: Query::path().with([Filter::kind(EntityKind::Tenant)]).build(),
            config,
            notifier,
        }
    }

    pub fn source_path(&self) -> &Query {
        &self.source_path
    }

    pub fn select_candidates(&self) -> &Query {
        &self.select_candidates
    }

    /// The full query reaching the current candidates.
    pub fn query(&self) -> Query {
        self.source_path.then(&self.select_candidates)
    }

    pub fn configuration(&self) -> &Configuration {
        &self.config
    }

    /// A builder narrowing or extending the current selection.
    pub fn proceed(&self) -> ContextBuilder<B> {
        ContextBuilder { select: self.select_candidates.extend(), origin: self.clone() }
    }

    /// Move across one `relationship` hop onto entities of `kind`.
    pub fn proceed_to(&self, relationship: WellKnown, kind: EntityKind) -> Self {
        Self {
            source_path: self.query(),
            select_candidates: Query::path()
                .with([Filter::related(relationship, Direction::Outgoing), Filter::kind(kind)])
                .build(),
            ..self.clone()
        }
    }

    /// Anchor at exactly the entity at `path`.
    pub fn replace_path(&self, path: CanonicalPath) -> Self {
        Self {
            source_path: Query::path().with([Filter::path(path)]).build(),
            select_candidates: Query::empty(),
            ..self.clone()
        }
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    pub(crate) async fn begin(&self, mode: TxMode) -> Result<B::Tx> {
        let tx = self.backend.begin_tx(mode).await?;
        trace!(id = %tx.id(), ?mode, "transaction started");
        Ok(tx)
    }

    /// Roll back after a failure. A failing rollback is logged; the
    /// original error is what the caller sees.
    pub(crate) async fn rollback(&self, tx: B::Tx) {
        let id = tx.id();
        match self.backend.rollback_tx(tx).await {
            Ok(()) => debug!(%id, "transaction rolled back"),
            Err(e) => warn!(%id, error = %e, "failed to roll back transaction"),
        }
    }

    /// Finish a mutating transaction: commit and publish on success, roll
    /// back on failure.
    ///
    /// Commit and publication happen under the notifier's gate, so
    /// notifications go out in commit order. Nothing is published unless
    /// the commit succeeded.
    pub(crate) async fn commit<T>(&self, tx: B::Tx, outcome: Result<Pending<T>>) -> Result<T> {
        match outcome {
            Ok(pending) => {
                let id = tx.id();
                let _gate = self.notifier.gate().await;
                self.backend.commit_tx(tx).await?;
                debug!(%id, notifications = pending.notifications.len(), "transaction committed");
                Ok(pending.publish(&self.notifier))
            }
            Err(e) => {
                self.rollback(tx).await;
                Err(e)
            }
        }
    }

    /// Finish a read-only transaction. Successful reads still commit.
    pub(crate) async fn finish_read<T>(&self, tx: B::Tx, outcome: Result<T>) -> Result<T> {
        match outcome {
            Ok(value) => {
                self.backend.commit_tx(tx).await?;
                Ok(value)
            }
            Err(e) => {
                self.rollback(tx).await;
                Err(e)
            }
        }
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    /// The first entity `query` reaches, or [`Error::EntityNotFound`].
    pub(crate) async fn get_single(&self, tx: &B::Tx, query: &Query, kind: Option<EntityKind>) -> Result<B::Element> {
        self.backend
            .query(tx, query, &Pager::single())
            .await?
            .into_first()
            .ok_or_else(|| match kind {
                Some(kind) => Error::EntityNotFound(format!("no {kind} at {query}")),
                None => Error::EntityNotFound(format!("nothing at {query}")),
            })
    }

    /// The entity at `path`, translating a missing element to
    /// [`Error::EntityNotFound`].
    pub(crate) async fn find_entity(&self, tx: &B::Tx, path: &CanonicalPath) -> Result<B::Element> {
        match self.backend.find(tx, path).await {
            Err(Error::ElementNotFound(_)) => Err(Error::EntityNotFound(path.to_string())),
            other => other,
        }
    }

    pub(crate) fn is_applicable(&self, element: &Element) -> bool {
        self.config.is_applicable(element)
    }
}

// ============================================================================
// ContextBuilder
// ============================================================================

/// Accumulates extra fragments on top of a context's selection.
pub struct ContextBuilder<B: InventoryBackend> {
    origin: TraversalContext<B>,
    select: QueryBuilder,
}

impl<B: InventoryBackend> ContextBuilder<B> {
    /// Narrow the selection; all filters must hold.
    pub fn where_(mut self, filters: impl IntoIterator<Item = Filter>) -> Self {
        self.select = self.select.filter().with(filters);
        self
    }

    /// Narrow the selection; any one of the groups must hold.
    pub fn where_all(mut self, groups: &[Vec<Filter>]) -> Self {
        self.select = self.select.filter().where_all(groups);
        self
    }

    /// Move along the graph.
    pub fn hop(mut self, filters: impl IntoIterator<Item = Filter>) -> Self {
        self.select = self.select.path().with(filters);
        self
    }

    pub fn get(self) -> TraversalContext<B> {
        TraversalContext { select_candidates: self.select.build(), ..self.origin }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::FragmentMode;
    use crate::storage::MemoryBackend;
    use pretty_assertions::assert_eq;

    fn root() -> TraversalContext<MemoryBackend> {
        TraversalContext::tenants(
            Arc::new(MemoryBackend::new()),
            Arc::new(Configuration::default()),
            Arc::new(Notifier::new()),
        )
    }

    #[test]
    fn test_proceed_never_mutates_origin() {
        let ctx = root();
        let before = ctx.query();
        let narrowed = ctx.proceed().where_([Filter::id("t1")]).get();

        assert_eq!(ctx.query(), before);
        assert_eq!(narrowed.source_path(), ctx.source_path());
        assert_eq!(narrowed.query().fragments().len(), before.fragments().len() + 1);
        assert_eq!(narrowed.query().fragments().last().map(|f| f.mode()), Some(FragmentMode::Filter));
    }

    #[test]
    fn test_proceed_to_moves_source() {
        let tenant = root().proceed().where_([Filter::id("t1")]).get();
        let envs = tenant.proceed_to(WellKnown::Contains, EntityKind::Environment);

        assert_eq!(envs.source_path(), &tenant.query());
        assert_eq!(envs.select_candidates().fragments().len(), 2);
    }

    #[test]
    fn test_replace_path_anchors_at_entity() {
        let path = CanonicalPath::tenant("t1").unwrap();
        let ctx = root().replace_path(path.clone());

        assert!(ctx.select_candidates().is_empty());
        assert_eq!(ctx.query(), Query::path().with([Filter::path(path)]).build());
    }
}
