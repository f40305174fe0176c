//! Canonical path: the identity of every entity in the inventory.
//!
//! A canonical path is an ordered list of `(kind, id)` segments rooted at a
//! tenant, e.g. `/t;acme/e;prod/f;agent-1/r;web-01`. Two entities are the
//! same entity iff their canonical paths are equal. Paths are immutable:
//! [`CanonicalPath::extend`] and [`CanonicalPath::up`] return fresh values.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smallvec::SmallVec;

use super::EntityKind;
use crate::{Error, Result};

/// One `(kind, id)` step of a canonical path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Segment {
    pub kind: EntityKind,
    pub id: String,
}

impl Segment {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into() }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};{}", self.kind.code(), self.id)
    }
}

/// Hierarchical, order-sensitive identifier rooted at a tenant.
///
/// The containment order is enforced on construction, so a value of this
/// type is always a legal path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalPath {
    segments: SmallVec<[Segment; 4]>,
}

impl CanonicalPath {
    pub fn builder() -> CanonicalPathBuilder {
        CanonicalPathBuilder::default()
    }

    /// Path of a tenant.
    pub fn tenant(id: impl Into<String>) -> Result<Self> {
        Self::builder().tenant(id).build()
    }

    /// Append a segment, returning a new path. `self` is unaffected.
    pub fn extend(&self, kind: EntityKind, id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        check_id(kind, &id)?;
        if !kind.legal_parents().contains(&self.kind()) {
            return Err(Error::InvalidPath(format!(
                "{} cannot be contained in {} (at '{self}')",
                kind.name(),
                self.kind().name(),
            )));
        }
        let mut segments = self.segments.clone();
        segments.push(Segment { kind, id });
        Ok(Self { segments })
    }

    /// The immediately containing path, or `None` at tenant level.
    pub fn up(&self) -> Option<Self> {
        if self.segments.len() <= 1 {
            return None;
        }
        let mut segments = self.segments.clone();
        segments.pop();
        Some(Self { segments })
    }

    /// The tenant this path is rooted at.
    pub fn root(&self) -> Self {
        Self { segments: self.segments.iter().take(1).cloned().collect() }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always false; present for symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    fn last(&self) -> &Segment {
        // Construction guarantees at least the tenant segment.
        &self.segments[self.segments.len() - 1]
    }

    /// Id of the entity this path points to.
    pub fn id(&self) -> &str {
        &self.last().id
    }

    /// Kind of the entity this path points to.
    pub fn kind(&self) -> EntityKind {
        self.last().kind
    }

    fn id_of(&self, kind: EntityKind) -> Option<&str> {
        self.segments.iter().find(|s| s.kind == kind).map(|s| s.id.as_str())
    }

    pub fn tenant_id(&self) -> &str {
        &self.segments[0].id
    }

    pub fn environment_id(&self) -> Option<&str> {
        self.id_of(EntityKind::Environment)
    }

    pub fn feed_id(&self) -> Option<&str> {
        self.id_of(EntityKind::Feed)
    }

    /// True if `self` is a strict prefix of `other`.
    pub fn is_ancestor_of(&self, other: &CanonicalPath) -> bool {
        self.segments.len() < other.segments.len()
            && other.segments.starts_with(&self.segments)
    }

    /// True if `other` is exactly one segment below `self`.
    pub fn is_parent_of(&self, other: &CanonicalPath) -> bool {
        self.segments.len() + 1 == other.segments.len() && self.is_ancestor_of(other)
    }
}

fn check_id(kind: EntityKind, id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::InvalidPath(format!("empty {} id", kind.name())));
    }
    if id.contains(['/', ';']) {
        return Err(Error::InvalidPath(format!(
            "{} id '{id}' must not contain '/' or ';'",
            kind.name()
        )));
    }
    Ok(())
}

// ============================================================================
// Builder
// ============================================================================

/// Accumulates segments; validation happens in [`build`](Self::build).
#[derive(Debug, Clone, Default)]
pub struct CanonicalPathBuilder {
    segments: SmallVec<[Segment; 4]>,
}

impl CanonicalPathBuilder {
    pub fn with(mut self, kind: EntityKind, id: impl Into<String>) -> Self {
        self.segments.push(Segment::new(kind, id));
        self
    }

    pub fn tenant(self, id: impl Into<String>) -> Self { self.with(EntityKind::Tenant, id) }
    pub fn environment(self, id: impl Into<String>) -> Self { self.with(EntityKind::Environment, id) }
    pub fn feed(self, id: impl Into<String>) -> Self { self.with(EntityKind::Feed, id) }
    pub fn resource_type(self, id: impl Into<String>) -> Self { self.with(EntityKind::ResourceType, id) }
    pub fn resource(self, id: impl Into<String>) -> Self { self.with(EntityKind::Resource, id) }
    pub fn metric_type(self, id: impl Into<String>) -> Self { self.with(EntityKind::MetricType, id) }
    pub fn metric(self, id: impl Into<String>) -> Self { self.with(EntityKind::Metric, id) }

    pub fn build(self) -> Result<CanonicalPath> {
        let mut segments = self.segments.into_iter();
        let first = segments
            .next()
            .ok_or_else(|| Error::InvalidPath("a canonical path needs at least a tenant".into()))?;
        if first.kind != EntityKind::Tenant {
            return Err(Error::InvalidPath(format!(
                "a canonical path must start with a tenant, not {}",
                first.kind.name()
            )));
        }
        let mut path = CanonicalPath::tenant_unchecked(first)?;
        for seg in segments {
            path = path.extend(seg.kind, seg.id)?;
        }
        Ok(path)
    }
}

impl CanonicalPath {
    fn tenant_unchecked(seg: Segment) -> Result<Self> {
        check_id(seg.kind, &seg.id)?;
        let mut segments = SmallVec::new();
        segments.push(seg);
        Ok(Self { segments })
    }
}

// ============================================================================
// String form
// ============================================================================

impl fmt::Display for CanonicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for seg in &self.segments {
            write!(f, "/{seg}")?;
        }
        Ok(())
    }
}

impl FromStr for CanonicalPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let rest = s
            .strip_prefix('/')
            .ok_or_else(|| Error::InvalidPath(format!("'{s}' does not start with '/'")))?;
        let mut builder = CanonicalPath::builder();
        for part in rest.split('/') {
            let (code, id) = part
                .split_once(';')
                .ok_or_else(|| Error::InvalidPath(format!("malformed segment '{part}' in '{s}'")))?;
            let kind = EntityKind::from_code(code)
                .ok_or_else(|| Error::InvalidPath(format!("unknown entity code '{code}' in '{s}'")))?;
            builder = builder.with(kind, id);
        }
        builder.build()
    }
}

impl Serialize for CanonicalPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CanonicalPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
