//! Filters: the atoms of a query.
//!
//! A filter never references a backend's native element type; it only
//! speaks in entity kinds, ids, canonical paths, property values and
//! relationship names.

use serde::{Deserialize, Serialize};

use crate::model::{CanonicalPath, Direction, EntityKind, Value, WellKnown};

/// Constraint on the relationship a node has (or is reached through).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Related {
    pub name: String,
    pub direction: Direction,
    /// When set, only edges whose other end is this entity qualify.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_end: Option<CanonicalPath>,
}

impl Related {
    /// Outgoing edges named `name`.
    pub fn by(name: impl Into<String>) -> Self {
        Self { name: name.into(), direction: Direction::Outgoing, other_end: None }
    }

    /// Incoming edges named `name`.
    pub fn as_target_of(name: impl Into<String>) -> Self {
        Self { name: name.into(), direction: Direction::Incoming, other_end: None }
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_other_end(mut self, path: CanonicalPath) -> Self {
        self.other_end = Some(path);
        self
    }
}

/// Narrowing predicates over the current node set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum With {
    /// Entity kind is any of these.
    Kinds(Vec<EntityKind>),
    /// Entity id is any of these.
    Ids(Vec<String>),
    /// Canonical path is any of these.
    Paths(Vec<CanonicalPath>),
    /// Property `name` equals any of `values`.
    PropertyValues { name: String, values: Vec<Value> },
}

/// A single fragment of the graph walk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Filter {
    Related(Related),
    With(With),
}

impl Filter {
    pub fn related(name: impl Into<String>, direction: Direction) -> Self {
        Filter::Related(Related::by(name).with_direction(direction))
    }

    /// Outgoing `contains` edge.
    pub fn contains() -> Self {
        Filter::Related(Related::by(WellKnown::Contains))
    }

    /// Incoming `contains` edge.
    pub fn contained_in() -> Self {
        Filter::Related(Related::as_target_of(WellKnown::Contains))
    }

    /// Outgoing edge named `name` whose target is `path`.
    pub fn related_to(name: impl Into<String>, path: CanonicalPath) -> Self {
        Filter::Related(Related::by(name).with_other_end(path))
    }

    pub fn kind(kind: EntityKind) -> Self {
        Filter::With(With::Kinds(vec![kind]))
    }

    pub fn kinds(kinds: impl IntoIterator<Item = EntityKind>) -> Self {
        Filter::With(With::Kinds(kinds.into_iter().collect()))
    }

    pub fn id(id: impl Into<String>) -> Self {
        Filter::With(With::Ids(vec![id.into()]))
    }

    pub fn ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Filter::With(With::Ids(ids.into_iter().map(Into::into).collect()))
    }

    pub fn path(path: CanonicalPath) -> Self {
        Filter::With(With::Paths(vec![path]))
    }

    pub fn paths(paths: impl IntoIterator<Item = CanonicalPath>) -> Self {
        Filter::With(With::Paths(paths.into_iter().collect()))
    }

    pub fn property(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::With(With::PropertyValues { name: name.into(), values: vec![value.into()] })
    }

    pub fn property_in<V: Into<Value>>(name: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Filter::With(With::PropertyValues {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        })
    }
}

impl From<Related> for Filter {
    fn from(r: Related) -> Self {
        Filter::Related(r)
    }
}

impl From<With> for Filter {
    fn from(w: With) -> Self {
        Filter::With(w)
    }
}
