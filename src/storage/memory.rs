//! In-memory storage backend.
//!
//! This is the reference implementation of [`InventoryBackend`].
//!
//! ## Transactions
//!
//! Each transaction starts from an immutable snapshot of the committed
//! graph and writes into a copy-on-write working copy, recording every
//! write in an operation log. On commit:
//!
//! - if nothing else committed since the snapshot was taken, the working
//!   copy is installed as is;
//! - otherwise the log is replayed on the newest committed state. Any write
//!   the newer state no longer admits (inserting an existing entity,
//!   touching a removed one, duplicating a well-known relationship) fails
//!   the whole commit with [`Error::Conflict`].
//!
//! Readers never block writers, and writers only serialize for the short
//! moment of installing the new state.
//!
//! ## Limitations
//!
//! - **No persistence**: everything is lost when the backend is dropped.
//! - **No property indexes**: property filters do a full scan.
//! - **Whole-graph copies**: the first write of a transaction clones the
//!   committed graph, and a commit that has to replay its log clones the
//!   newest state again, so each mutating transaction costs O(graph size).

mod state;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, trace};
use uuid::Uuid;

use self::state::{GraphState, Op};
use super::InventoryBackend;
use crate::model::*;
use crate::query::{Page, Pager, Query};
use crate::tx::{Transaction, TxId, TxMode};
use crate::{Error, Result};

// ============================================================================
// MemoryBackend
// ============================================================================

/// In-memory inventory graph storage.
///
/// Cloning is cheap and yields a handle to the same graph.
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    committed: RwLock<Committed>,
    next_tx_id: AtomicU64,
}

struct Committed {
    state: Arc<GraphState>,
    version: u64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                committed: RwLock::new(Committed { state: Arc::new(GraphState::default()), version: 0 }),
                next_tx_id: AtomicU64::new(1),
            }),
        }
    }

    /// The committed entity at `path`, read outside any transaction.
    pub fn committed_entity(&self, path: &CanonicalPath) -> Option<Entity> {
        self.inner.committed.read().state.entities.get(path).cloned()
    }

    /// Number of committed entities.
    pub fn entity_count(&self) -> usize {
        self.inner.committed.read().state.entities.len()
    }

    /// Number of committed relationships.
    pub fn relationship_count(&self) -> usize {
        self.inner.committed.read().state.relationships.len()
    }

    fn snapshot(&self) -> (Arc<GraphState>, u64) {
        let committed = self.inner.committed.read();
        (Arc::clone(&committed.state), committed.version)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// MemoryTx
// ============================================================================

/// Snapshot transaction with an operation log.
pub struct MemoryTx {
    id: TxId,
    mode: TxMode,
    base_version: u64,
    working: Arc<GraphState>,
    log: Vec<Op>,
}

impl MemoryTx {
    fn state(&self) -> &GraphState {
        &self.working
    }

    fn write(&mut self, op: Op) -> Result<()> {
        if !self.mode.is_mutating() {
            return Err(Error::TxError(format!("{} is read-only", self.id)));
        }
        Arc::make_mut(&mut self.working).apply(&op)?;
        self.log.push(op);
        Ok(())
    }
}

impl Transaction for MemoryTx {
    fn mode(&self) -> TxMode { self.mode }
    fn id(&self) -> TxId { self.id }
}

// ============================================================================
// MemoryElement
// ============================================================================

/// Native handle of the memory backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemoryElement {
    Entity(CanonicalPath),
    Relationship(String),
}

impl MemoryElement {
    fn entity_path(&self) -> Result<&CanonicalPath> {
        match self {
            MemoryElement::Entity(path) => Ok(path),
            MemoryElement::Relationship(id) => Err(Error::InvalidArgument(format!(
                "expected an entity handle, found relationship '{id}'"
            ))),
        }
    }
}

// ============================================================================
// InventoryBackend implementation
// ============================================================================

#[async_trait]
impl InventoryBackend for MemoryBackend {
    type Tx = MemoryTx;
    type Element = MemoryElement;

    async fn begin_tx(&self, mode: TxMode) -> Result<MemoryTx> {
        let id = TxId(self.inner.next_tx_id.fetch_add(1, Ordering::Relaxed));
        let (working, base_version) = self.snapshot();
        trace!(%id, ?mode, base_version, "begin");
        Ok(MemoryTx { id, mode, base_version, working, log: Vec::new() })
    }

    async fn commit_tx(&self, tx: MemoryTx) -> Result<()> {
        if tx.log.is_empty() {
            trace!(id = %tx.id, "commit (no writes)");
            return Ok(());
        }
        let mut committed = self.inner.committed.write();
        if committed.version == tx.base_version {
            committed.state = tx.working;
        } else {
            debug!(
                id = %tx.id,
                base = tx.base_version,
                head = committed.version,
                ops = tx.log.len(),
                "replaying transaction on newer state"
            );
            let mut next = (*committed.state).clone();
            for op in &tx.log {
                next.apply(op)?;
            }
            committed.state = Arc::new(next);
        }
        committed.version += 1;
        trace!(id = %tx.id, version = committed.version, "commit");
        Ok(())
    }

    async fn rollback_tx(&self, tx: MemoryTx) -> Result<()> {
        trace!(id = %tx.id, discarded = tx.log.len(), "rollback");
        Ok(())
    }

    // ========================================================================
    // Reads
    // ========================================================================

    async fn query(&self, tx: &MemoryTx, query: &Query, pager: &Pager) -> Result<Page<MemoryElement>> {
        let reached = tx.state().evaluate(query);
        Ok(pager.apply(reached).map(MemoryElement::Entity))
    }

    async fn find(&self, tx: &MemoryTx, path: &CanonicalPath) -> Result<MemoryElement> {
        if tx.state().entities.contains_key(path) {
            Ok(MemoryElement::Entity(path.clone()))
        } else {
            Err(Error::ElementNotFound(path.to_string()))
        }
    }

    async fn find_relationship(&self, tx: &MemoryTx, id: &str) -> Result<MemoryElement> {
        if tx.state().relationships.contains_key(id) {
            Ok(MemoryElement::Relationship(id.to_owned()))
        } else {
            Err(Error::ElementNotFound(format!("relationship '{id}'")))
        }
    }

    async fn get_relationship(
        &self,
        tx: &MemoryTx,
        source: &MemoryElement,
        target: &MemoryElement,
        name: &str,
    ) -> Result<MemoryElement> {
        let (source, target) = (source.entity_path()?, target.entity_path()?);
        tx.state()
            .relationship_between(source, target, name)
            .map(|rel| MemoryElement::Relationship(rel.id.clone()))
            .ok_or_else(|| Error::ElementNotFound(format!("{source} --{name}--> {target}")))
    }

    async fn get_relationships(
        &self,
        tx: &MemoryTx,
        element: &MemoryElement,
        direction: Direction,
        name: Option<&str>,
    ) -> Result<Vec<MemoryElement>> {
        let at = element.entity_path()?;
        if !tx.state().entities.contains_key(at) {
            return Err(Error::ElementNotFound(at.to_string()));
        }
        let mut rels = tx.state().relationships_of(at, direction, name);
        rels.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(rels.into_iter().map(|r| MemoryElement::Relationship(r.id.clone())).collect())
    }

    // ========================================================================
    // Writes
    // ========================================================================

    async fn persist(
        &self,
        tx: &mut MemoryTx,
        path: &CanonicalPath,
        blueprint: &Blueprint,
    ) -> Result<MemoryElement> {
        let entity = Entity::from_blueprint(path.clone(), blueprint)?;
        tx.write(Op::InsertEntity(entity))?;
        Ok(MemoryElement::Entity(path.clone()))
    }

    async fn relate(
        &self,
        tx: &mut MemoryTx,
        source: &MemoryElement,
        target: &MemoryElement,
        name: &str,
        properties: PropertyMap,
    ) -> Result<MemoryElement> {
        let (source, target) = (source.entity_path()?, target.entity_path()?);
        let mut rel = Relationship::new(Uuid::new_v4().to_string(), name, source.clone(), target.clone());
        rel.properties = properties;
        let handle = MemoryElement::Relationship(rel.id.clone());
        tx.write(Op::InsertRelationship(rel))?;
        Ok(handle)
    }

    async fn delete(&self, tx: &mut MemoryTx, element: &MemoryElement) -> Result<()> {
        match element {
            MemoryElement::Entity(path) => {
                if !tx.state().entities.contains_key(path) {
                    return Err(Error::ElementNotFound(path.to_string()));
                }
                if tx.state().contains_children(path) {
                    return Err(Error::ConstraintViolation(format!(
                        "cannot delete '{path}': it still contains other entities"
                    )));
                }
                let detached: Vec<String> = tx
                    .state()
                    .relationships_of(path, Direction::Both, None)
                    .into_iter()
                    .map(|r| r.id.clone())
                    .collect();
                for id in detached {
                    tx.write(Op::RemoveRelationship(id))?;
                }
                tx.write(Op::RemoveEntity(path.clone()))
            }
            MemoryElement::Relationship(id) => {
                if !tx.state().relationships.contains_key(id) {
                    return Err(Error::ElementNotFound(format!("relationship '{id}'")));
                }
                tx.write(Op::RemoveRelationship(id.clone()))
            }
        }
    }

    async fn update(&self, tx: &mut MemoryTx, element: &MemoryElement, update: &Update) -> Result<()> {
        match element {
            MemoryElement::Entity(path) => {
                let next = tx
                    .state()
                    .entities
                    .get(path)
                    .ok_or_else(|| Error::ElementNotFound(path.to_string()))?
                    .apply(update)?;
                tx.write(Op::ReplaceEntity(next))
            }
            MemoryElement::Relationship(id) => {
                let next = tx
                    .state()
                    .relationships
                    .get(id)
                    .ok_or_else(|| Error::ElementNotFound(format!("relationship '{id}'")))?
                    .apply(update)?;
                tx.write(Op::ReplaceRelationship(next))
            }
        }
    }

    // ========================================================================
    // Handle inspection
    // ========================================================================

    fn extract_id(&self, element: &MemoryElement) -> String {
        match element {
            MemoryElement::Entity(path) => path.id().to_owned(),
            MemoryElement::Relationship(id) => id.clone(),
        }
    }

    fn extract_type(&self, element: &MemoryElement) -> ElementKind {
        match element {
            MemoryElement::Entity(path) => ElementKind::Entity(path.kind()),
            MemoryElement::Relationship(_) => ElementKind::Relationship,
        }
    }

    async fn convert(&self, tx: &MemoryTx, element: &MemoryElement, kind: ElementKind) -> Result<Element> {
        let actual = self.extract_type(element);
        if actual != kind {
            return Err(Error::InvalidArgument(format!("cannot convert {actual} to {kind}")));
        }
        match element {
            MemoryElement::Entity(path) => tx
                .state()
                .entities
                .get(path)
                .cloned()
                .map(Element::Entity)
                .ok_or_else(|| Error::ElementNotFound(path.to_string())),
            MemoryElement::Relationship(id) => tx
                .state()
                .relationships
                .get(id)
                .cloned()
                .map(Element::Relationship)
                .ok_or_else(|| Error::ElementNotFound(format!("relationship '{id}'"))),
        }
    }

    async fn close(&self) -> Result<()> {
        debug!(
            entities = self.entity_count(),
            relationships = self.relationship_count(),
            "closing memory backend"
        );
        Ok(())
    }
}
