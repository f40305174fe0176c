//! # Inventory Backend Trait
//!
//! This is THE contract between the traversal engine and any storage
//! engine. The engine compiles fluent calls into [`Query`] values and hands
//! them, together with a transaction, to an [`InventoryBackend`].
//!
//! ## Implementations
//!
//! | Backend | Module | Description |
//! |---------|--------|-------------|
//! | `MemoryBackend` | `memory` | In-memory reference implementation |
//!
//! ## Transaction contract
//!
//! - Mutations take effect only on `commit_tx`. Before that they are
//!   visible to later reads in the same transaction and nowhere else.
//! - A rolled-back transaction leaves no observable trace.
//! - Transactions touching disjoint subtrees must not block each other.
//! - At most one relationship per `(source, target, name)` exists for the
//!   well-known names. A commit that would violate this fails with
//!   [`Error::Conflict`] instead of duplicating.

pub mod memory;

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;

use crate::model::*;
use crate::query::{Page, Pager, Query};
use crate::tx::{Transaction, TxMode};
use crate::{Error, Result};

pub use memory::{MemoryBackend, MemoryElement, MemoryTx};

// ============================================================================
// Backend Configuration
// ============================================================================

/// Which storage engine to connect to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BackendConfig {
    /// In-memory (no persistence)
    #[default]
    Memory,

    /// An external engine identified by name; its connection parameters
    /// travel opaquely in [`crate::Configuration::properties`].
    External { name: String },
}

impl BackendConfig {
    pub fn external(name: impl Into<String>) -> Self {
        BackendConfig::External { name: name.into() }
    }
}

/// Backend-specific connection parameters, opaque to the core.
pub type BackendProperties = HashMap<String, String>;

// ============================================================================
// InventoryBackend Trait
// ============================================================================

/// The storage contract.
///
/// `Element` is the backend's native handle for a stored entity or
/// relationship. The engine never looks inside it; it only passes handles
/// back to the backend and asks for [`convert`](Self::convert)ed domain
/// objects.
#[async_trait]
pub trait InventoryBackend: Send + Sync + 'static {
    /// The transaction type for this backend.
    type Tx: Transaction;

    /// Native element handle.
    type Element: Clone + fmt::Debug + Send + Sync;

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Begin a new transaction.
    async fn begin_tx(&self, mode: TxMode) -> Result<Self::Tx>;

    /// Commit a transaction. On error the transaction is discarded.
    async fn commit_tx(&self, tx: Self::Tx) -> Result<()>;

    /// Roll back a transaction.
    async fn rollback_tx(&self, tx: Self::Tx) -> Result<()>;

    // ========================================================================
    // Reads
    // ========================================================================

    /// Evaluate a query to the entities it reaches, in a stable order.
    async fn query(&self, tx: &Self::Tx, query: &Query, pager: &Pager) -> Result<Page<Self::Element>>;

    /// The entity at `path`, or [`Error::ElementNotFound`].
    async fn find(&self, tx: &Self::Tx, path: &CanonicalPath) -> Result<Self::Element>;

    /// The relationship with the given id, or [`Error::ElementNotFound`].
    async fn find_relationship(&self, tx: &Self::Tx, id: &str) -> Result<Self::Element>;

    /// The relationship `source --name--> target`, or [`Error::ElementNotFound`].
    async fn get_relationship(
        &self,
        tx: &Self::Tx,
        source: &Self::Element,
        target: &Self::Element,
        name: &str,
    ) -> Result<Self::Element>;

    /// Whether `source --name--> target` exists.
    ///
    /// Default: `get_relationship` and map not-found to `false`.
    async fn has_relationship(
        &self,
        tx: &Self::Tx,
        source: &Self::Element,
        target: &Self::Element,
        name: &str,
    ) -> Result<bool> {
        match self.get_relationship(tx, source, target, name).await {
            Ok(_) => Ok(true),
            Err(Error::ElementNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Relationships touching an entity, optionally only those named `name`.
    async fn get_relationships(
        &self,
        tx: &Self::Tx,
        element: &Self::Element,
        direction: Direction,
        name: Option<&str>,
    ) -> Result<Vec<Self::Element>>;

    // ========================================================================
    // Writes
    // ========================================================================

    /// Store a new entity at `path`.
    async fn persist(
        &self,
        tx: &mut Self::Tx,
        path: &CanonicalPath,
        blueprint: &Blueprint,
    ) -> Result<Self::Element>;

    /// Create the relationship `source --name--> target`.
    async fn relate(
        &self,
        tx: &mut Self::Tx,
        source: &Self::Element,
        target: &Self::Element,
        name: &str,
        properties: PropertyMap,
    ) -> Result<Self::Element>;

    /// Delete an entity or relationship.
    ///
    /// Entities that still contain other entities cannot be deleted
    /// ([`Error::ConstraintViolation`]); any other relationships touching the
    /// entity are detached in the same transaction.
    async fn delete(&self, tx: &mut Self::Tx, element: &Self::Element) -> Result<()>;

    /// Apply an update to an entity or relationship.
    async fn update(&self, tx: &mut Self::Tx, element: &Self::Element, update: &Update) -> Result<()>;

    // ========================================================================
    // Handle inspection
    // ========================================================================

    /// The entity id or relationship id behind a handle.
    fn extract_id(&self, element: &Self::Element) -> String;

    fn extract_type(&self, element: &Self::Element) -> ElementKind;

    /// Convert a handle to the domain object, checking it is of `kind`.
    async fn convert(&self, tx: &Self::Tx, element: &Self::Element, kind: ElementKind) -> Result<Element>;

    /// Convert a handle known to be an entity.
    async fn convert_entity(&self, tx: &Self::Tx, element: &Self::Element) -> Result<Entity> {
        let kind = self.extract_type(element);
        match self.convert(tx, element, kind).await? {
            Element::Entity(e) => Ok(e),
            Element::Relationship(r) => Err(Error::InvalidArgument(format!(
                "expected an entity, found relationship '{}'",
                r.id
            ))),
        }
    }

    /// Convert a handle known to be a relationship.
    async fn convert_relationship(&self, tx: &Self::Tx, element: &Self::Element) -> Result<Relationship> {
        match self.convert(tx, element, ElementKind::Relationship).await? {
            Element::Relationship(r) => Ok(r),
            Element::Entity(e) => Err(Error::InvalidArgument(format!(
                "expected a relationship, found {} '{}'",
                e.kind(),
                e.path()
            ))),
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Shut down the backend, flushing any pending writes.
    async fn close(&self) -> Result<()>;
}
