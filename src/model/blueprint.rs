//! Creation and update payloads.
//!
//! A blueprint carries everything needed to create an entity except the
//! parent context, which comes from the traversal position `create` is
//! called at. An [`Update`] carries only the mutable fields.

use serde::{Deserialize, Serialize};

use super::{EntityKind, MetricUnit, PropertyMap, Value};

macro_rules! blueprint_common {
    ($bp:ident) => {
        impl $bp {
            /// Use `id` instead of a generated one.
            pub fn with_id(mut self, id: impl Into<String>) -> Self {
                self.id = Some(id.into());
                self
            }

            pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
                self.properties.insert(key.into(), value.into());
                self
            }

            pub fn with_properties(mut self, properties: PropertyMap) -> Self {
                self.properties.extend(properties);
                self
            }
        }
    };
}

/// Blueprint of an entity that has nothing besides an id and properties.
macro_rules! plain_blueprint {
    ($(#[$doc:meta])* $bp:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        pub struct $bp {
            pub id: Option<String>,
            #[serde(default)]
            pub properties: PropertyMap,
        }

        impl $bp {
            pub fn new(id: impl Into<String>) -> Self {
                Self { id: Some(id.into()), properties: PropertyMap::new() }
            }
        }

        blueprint_common!($bp);
    };
}

plain_blueprint!(TenantBlueprint);
plain_blueprint!(EnvironmentBlueprint);
plain_blueprint!(
    /// The id may be rewritten by the configured feed id strategy.
    FeedBlueprint
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceTypeBlueprint {
    pub id: Option<String>,
    pub version: String,
    #[serde(default)]
    pub properties: PropertyMap,
}

impl ResourceTypeBlueprint {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self { id: Some(id.into()), version: version.into(), properties: PropertyMap::new() }
    }
}

blueprint_common!(ResourceTypeBlueprint);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceBlueprint {
    pub id: Option<String>,
    /// Id of a resource type in the same tenant.
    pub resource_type_id: String,
    #[serde(default)]
    pub properties: PropertyMap,
}

impl ResourceBlueprint {
    pub fn new(id: impl Into<String>, resource_type_id: impl Into<String>) -> Self {
        Self::of_type(resource_type_id).with_id(id)
    }

    /// A resource of the given type with a generated id.
    pub fn of_type(resource_type_id: impl Into<String>) -> Self {
        Self { id: None, resource_type_id: resource_type_id.into(), properties: PropertyMap::new() }
    }
}

blueprint_common!(ResourceBlueprint);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricTypeBlueprint {
    pub id: Option<String>,
    #[serde(default)]
    pub unit: MetricUnit,
    #[serde(default)]
    pub properties: PropertyMap,
}

impl MetricTypeBlueprint {
    pub fn new(id: impl Into<String>, unit: MetricUnit) -> Self {
        Self { id: Some(id.into()), unit, properties: PropertyMap::new() }
    }
}

blueprint_common!(MetricTypeBlueprint);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricBlueprint {
    pub id: Option<String>,
    /// Id of a metric type in the same tenant.
    pub metric_type_id: String,
    #[serde(default)]
    pub properties: PropertyMap,
}

impl MetricBlueprint {
    pub fn new(id: impl Into<String>, metric_type_id: impl Into<String>) -> Self {
        Self::of_type(metric_type_id).with_id(id)
    }

    pub fn of_type(metric_type_id: impl Into<String>) -> Self {
        Self { id: None, metric_type_id: metric_type_id.into(), properties: PropertyMap::new() }
    }
}

blueprint_common!(MetricBlueprint);

// ============================================================================
// Blueprint (sum type handed to the backend)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Blueprint {
    Tenant(TenantBlueprint),
    Environment(EnvironmentBlueprint),
    Feed(FeedBlueprint),
    ResourceType(ResourceTypeBlueprint),
    Resource(ResourceBlueprint),
    MetricType(MetricTypeBlueprint),
    Metric(MetricBlueprint),
}

impl Blueprint {
    pub fn kind(&self) -> EntityKind {
        match self {
            Blueprint::Tenant(_) => EntityKind::Tenant,
            Blueprint::Environment(_) => EntityKind::Environment,
            Blueprint::Feed(_) => EntityKind::Feed,
            Blueprint::ResourceType(_) => EntityKind::ResourceType,
            Blueprint::Resource(_) => EntityKind::Resource,
            Blueprint::MetricType(_) => EntityKind::MetricType,
            Blueprint::Metric(_) => EntityKind::Metric,
        }
    }

    /// The id the caller asked for, if any.
    pub fn proposed_id(&self) -> Option<&str> {
        let id = match self {
            Blueprint::Tenant(bp) => &bp.id,
            Blueprint::Environment(bp) => &bp.id,
            Blueprint::Feed(bp) => &bp.id,
            Blueprint::ResourceType(bp) => &bp.id,
            Blueprint::Resource(bp) => &bp.id,
            Blueprint::MetricType(bp) => &bp.id,
            Blueprint::Metric(bp) => &bp.id,
        };
        id.as_deref()
    }

    pub fn properties(&self) -> &PropertyMap {
        match self {
            Blueprint::Tenant(bp) => &bp.properties,
            Blueprint::Environment(bp) => &bp.properties,
            Blueprint::Feed(bp) => &bp.properties,
            Blueprint::ResourceType(bp) => &bp.properties,
            Blueprint::Resource(bp) => &bp.properties,
            Blueprint::MetricType(bp) => &bp.properties,
            Blueprint::Metric(bp) => &bp.properties,
        }
    }
}

macro_rules! into_blueprint {
    ($variant:ident, $bp:ident) => {
        impl From<$bp> for Blueprint {
            fn from(bp: $bp) -> Self {
                Blueprint::$variant(bp)
            }
        }
    };
}

into_blueprint!(Tenant, TenantBlueprint);
into_blueprint!(Environment, EnvironmentBlueprint);
into_blueprint!(Feed, FeedBlueprint);
into_blueprint!(ResourceType, ResourceTypeBlueprint);
into_blueprint!(Resource, ResourceBlueprint);
into_blueprint!(MetricType, MetricTypeBlueprint);
into_blueprint!(Metric, MetricBlueprint);

// ============================================================================
// Update
// ============================================================================

/// Partial mutation of an entity or relationship.
///
/// `properties`, when present, replaces the whole property map.
/// `version` applies only to resource types and `unit` only to metric types.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Update {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<PropertyMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<MetricUnit>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_properties(mut self, properties: PropertyMap) -> Self {
        self.properties = Some(properties);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties
            .get_or_insert_with(PropertyMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_unit(mut self, unit: MetricUnit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Only touches properties, so it is valid for relationships too.
    pub fn is_properties_only(&self) -> bool {
        self.version.is_none() && self.unit.is_none()
    }
}
