//! Relationship (edge) between two entities.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{CanonicalPath, PropertyMap, Update, Value};
use crate::{Error, Result};

/// Traversal direction, from the point of view of the current position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

/// Relationship names with reserved system meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WellKnown {
    /// Structural containment; mirrors the canonical path hierarchy.
    Contains,
    /// A type defines its instances (resource type → resource, metric type → metric).
    Defines,
    /// Association such as resource → metric.
    Owns,
}

impl WellKnown {
    pub const ALL: [WellKnown; 3] = [WellKnown::Contains, WellKnown::Defines, WellKnown::Owns];

    pub fn as_str(self) -> &'static str {
        match self {
            WellKnown::Contains => "contains",
            WellKnown::Defines => "defines",
            WellKnown::Owns => "owns",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|w| w.as_str() == name)
    }

    /// Whether `name` is reserved, and so limited to one edge per ordered pair.
    pub fn is_well_known(name: &str) -> bool {
        Self::from_name(name).is_some()
    }
}

impl fmt::Display for WellKnown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<WellKnown> for String {
    fn from(w: WellKnown) -> Self {
        w.as_str().to_owned()
    }
}

/// A named, directed edge between two entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: String,
    pub name: String,
    pub source: CanonicalPath,
    pub target: CanonicalPath,
    #[serde(default)]
    pub properties: PropertyMap,
}

impl Relationship {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        source: CanonicalPath,
        target: CanonicalPath,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            source,
            target,
            properties: PropertyMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// The "other" end of the relationship from the given entity.
    pub fn other_end(&self, from: &CanonicalPath) -> Option<&CanonicalPath> {
        if *from == self.source { Some(&self.target) }
        else if *from == self.target { Some(&self.source) }
        else { None }
    }

    /// Whether this edge touches `at` in the given direction.
    pub fn touches(&self, at: &CanonicalPath, dir: Direction) -> bool {
        match dir {
            Direction::Outgoing => self.source == *at,
            Direction::Incoming => self.target == *at,
            Direction::Both => self.source == *at || self.target == *at,
        }
    }

    /// Relationships only carry properties; anything else is rejected.
    pub fn apply(&self, update: &Update) -> Result<Relationship> {
        if !update.is_properties_only() {
            return Err(Error::InvalidArgument(format!(
                "relationship '{}' only accepts property updates",
                self.id
            )));
        }
        let mut next = self.clone();
        if let Some(props) = &update.properties {
            next.properties = props.clone();
        }
        Ok(next)
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} --{}--> {} [{}]", self.source, self.name, self.target, self.id)
    }
}
