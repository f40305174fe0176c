//! Inventory entities.
//!
//! Every entity variant is a plain struct carrying its canonical path and
//! free-form properties; [`Entity`] is the sum type over all of them.
//! Type-specific behavior is written as an exhaustive `match`.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::blueprint::{
    Blueprint, EnvironmentBlueprint, FeedBlueprint, MetricBlueprint, MetricTypeBlueprint,
    ResourceBlueprint, ResourceTypeBlueprint, TenantBlueprint, Update,
};
use super::{CanonicalPath, PropertyMap};
use crate::{Error, Result};

// ============================================================================
// EntityKind
// ============================================================================

/// Discriminant of the entity variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    Tenant,
    Environment,
    Feed,
    ResourceType,
    Resource,
    MetricType,
    Metric,
}

impl EntityKind {
    pub const ALL: [EntityKind; 7] = [
        EntityKind::Tenant,
        EntityKind::Environment,
        EntityKind::Feed,
        EntityKind::ResourceType,
        EntityKind::Resource,
        EntityKind::MetricType,
        EntityKind::Metric,
    ];

    /// Short code used in the string form of canonical paths.
    pub fn code(self) -> &'static str {
        match self {
            EntityKind::Tenant => "t",
            EntityKind::Environment => "e",
            EntityKind::Feed => "f",
            EntityKind::ResourceType => "rt",
            EntityKind::Resource => "r",
            EntityKind::MetricType => "mt",
            EntityKind::Metric => "m",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.code() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            EntityKind::Tenant => "tenant",
            EntityKind::Environment => "environment",
            EntityKind::Feed => "feed",
            EntityKind::ResourceType => "resource type",
            EntityKind::Resource => "resource",
            EntityKind::MetricType => "metric type",
            EntityKind::Metric => "metric",
        }
    }

    /// Kinds that may directly contain this kind. Empty for the root.
    pub fn legal_parents(self) -> &'static [EntityKind] {
        match self {
            EntityKind::Tenant => &[],
            EntityKind::Environment | EntityKind::ResourceType | EntityKind::MetricType => {
                &[EntityKind::Tenant]
            }
            EntityKind::Feed => &[EntityKind::Environment],
            EntityKind::Resource | EntityKind::Metric => {
                &[EntityKind::Environment, EntityKind::Feed]
            }
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// MetricUnit
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricUnit {
    #[default]
    None,
    Milliseconds,
    Seconds,
    Minutes,
    Bytes,
    Kilobytes,
    Megabytes,
    Gigabytes,
    Percentage,
}

// ============================================================================
// Entity structs
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub path: CanonicalPath,
    #[serde(default)]
    pub properties: PropertyMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub path: CanonicalPath,
    #[serde(default)]
    pub properties: PropertyMap,
}

/// An agent reporting resources and metrics for an environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feed {
    pub path: CanonicalPath,
    #[serde(default)]
    pub properties: PropertyMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceType {
    pub path: CanonicalPath,
    pub version: String,
    #[serde(default)]
    pub properties: PropertyMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub path: CanonicalPath,
    /// The resource type that `defines` this resource.
    pub resource_type: CanonicalPath,
    #[serde(default)]
    pub properties: PropertyMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricType {
    pub path: CanonicalPath,
    pub unit: MetricUnit,
    #[serde(default)]
    pub properties: PropertyMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub path: CanonicalPath,
    /// The metric type that `defines` this metric.
    pub metric_type: CanonicalPath,
    #[serde(default)]
    pub properties: PropertyMap,
}

// ============================================================================
// Entity (sum type)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Entity {
    Tenant(Tenant),
    Environment(Environment),
    Feed(Feed),
    ResourceType(ResourceType),
    Resource(Resource),
    MetricType(MetricType),
    Metric(Metric),
}

impl Entity {
    pub fn path(&self) -> &CanonicalPath {
        match self {
            Entity::Tenant(e) => &e.path,
            Entity::Environment(e) => &e.path,
            Entity::Feed(e) => &e.path,
            Entity::ResourceType(e) => &e.path,
            Entity::Resource(e) => &e.path,
            Entity::MetricType(e) => &e.path,
            Entity::Metric(e) => &e.path,
        }
    }

    pub fn properties(&self) -> &PropertyMap {
        match self {
            Entity::Tenant(e) => &e.properties,
            Entity::Environment(e) => &e.properties,
            Entity::Feed(e) => &e.properties,
            Entity::ResourceType(e) => &e.properties,
            Entity::Resource(e) => &e.properties,
            Entity::MetricType(e) => &e.properties,
            Entity::Metric(e) => &e.properties,
        }
    }

    fn properties_mut(&mut self) -> &mut PropertyMap {
        match self {
            Entity::Tenant(e) => &mut e.properties,
            Entity::Environment(e) => &mut e.properties,
            Entity::Feed(e) => &mut e.properties,
            Entity::ResourceType(e) => &mut e.properties,
            Entity::Resource(e) => &mut e.properties,
            Entity::MetricType(e) => &mut e.properties,
            Entity::Metric(e) => &mut e.properties,
        }
    }

    pub fn id(&self) -> &str {
        self.path().id()
    }

    pub fn kind(&self) -> EntityKind {
        self.path().kind()
    }

    /// Materialize the entity a blueprint describes at `path`.
    ///
    /// Only structural checks happen here (the blueprint kind must match the
    /// path kind). Whether referenced types exist is the caller's concern.
    pub fn from_blueprint(path: CanonicalPath, blueprint: &Blueprint) -> Result<Entity> {
        if blueprint.kind() != path.kind() {
            return Err(Error::InvalidArgument(format!(
                "{} blueprint cannot be stored at {} path '{path}'",
                blueprint.kind(),
                path.kind(),
            )));
        }
        let entity = match blueprint {
            Blueprint::Tenant(bp) => Entity::Tenant(Tenant {
                path,
                properties: bp.properties.clone(),
            }),
            Blueprint::Environment(bp) => Entity::Environment(Environment {
                path,
                properties: bp.properties.clone(),
            }),
            Blueprint::Feed(bp) => Entity::Feed(Feed {
                path,
                properties: bp.properties.clone(),
            }),
            Blueprint::ResourceType(bp) => Entity::ResourceType(ResourceType {
                path,
                version: bp.version.clone(),
                properties: bp.properties.clone(),
            }),
            Blueprint::Resource(bp) => {
                let resource_type = path.root().extend(EntityKind::ResourceType, &bp.resource_type_id)?;
                Entity::Resource(Resource {
                    path,
                    resource_type,
                    properties: bp.properties.clone(),
                })
            }
            Blueprint::MetricType(bp) => Entity::MetricType(MetricType {
                path,
                unit: bp.unit,
                properties: bp.properties.clone(),
            }),
            Blueprint::Metric(bp) => {
                let metric_type = path.root().extend(EntityKind::MetricType, &bp.metric_type_id)?;
                Entity::Metric(Metric {
                    path,
                    metric_type,
                    properties: bp.properties.clone(),
                })
            }
        };
        Ok(entity)
    }

    /// Apply the mutable subset of fields, returning the updated entity.
    pub fn apply(&self, update: &Update) -> Result<Entity> {
        let mut next = self.clone();
        if let Some(version) = &update.version {
            match &mut next {
                Entity::ResourceType(rt) => rt.version = version.clone(),
                other => {
                    return Err(Error::InvalidArgument(format!(
                        "a {} has no version",
                        other.kind()
                    )));
                }
            }
        }
        if let Some(unit) = update.unit {
            match &mut next {
                Entity::MetricType(mt) => mt.unit = unit,
                other => {
                    return Err(Error::InvalidArgument(format!("a {} has no unit", other.kind())));
                }
            }
        }
        if let Some(props) = &update.properties {
            *next.properties_mut() = props.clone();
        }
        Ok(next)
    }
}

// ============================================================================
// EntityType: static mapping from struct to kind and blueprint
// ============================================================================

/// Implemented by each entity struct so fluent views can be typed by it.
pub trait EntityType: Clone + Send + Sync + fmt::Debug + 'static {
    const KIND: EntityKind;
    type Blueprint: Into<Blueprint> + Send + Sync;

    fn from_entity(entity: Entity) -> Option<Self>;
    fn into_entity(self) -> Entity;
}

macro_rules! entity_type {
    ($ty:ident, $bp:ident) => {
        impl EntityType for $ty {
            const KIND: EntityKind = EntityKind::$ty;
            type Blueprint = $bp;

            fn from_entity(entity: Entity) -> Option<Self> {
                match entity {
                    Entity::$ty(e) => Some(e),
                    _ => None,
                }
            }

            fn into_entity(self) -> Entity {
                Entity::$ty(self)
            }
        }

        impl $ty {
            pub fn id(&self) -> &str {
                self.path.id()
            }
        }

        impl From<$ty> for Entity {
            fn from(e: $ty) -> Self {
                Entity::$ty(e)
            }
        }
    };
}

entity_type!(Tenant, TenantBlueprint);
entity_type!(Environment, EnvironmentBlueprint);
entity_type!(Feed, FeedBlueprint);
entity_type!(ResourceType, ResourceTypeBlueprint);
entity_type!(Resource, ResourceBlueprint);
entity_type!(MetricType, MetricTypeBlueprint);
entity_type!(Metric, MetricBlueprint);
