//! # Inventory Model
//!
//! Clean DTOs for the inventory graph: canonical paths, entities,
//! relationships, blueprints and updates. These types cross every
//! boundary: backend ↔ traversal ↔ notification ↔ user.
//!
//! Design rule: this module is pure data: no I/O, no state, no async,
//! and nothing here knows about a backend's native element handle.

pub mod path;
pub mod entity;
pub mod relationship;
pub mod element;
pub mod blueprint;
pub mod value;
pub mod property_map;

pub use path::{CanonicalPath, CanonicalPathBuilder, Segment};
pub use entity::{
    Entity, EntityKind, EntityType, MetricUnit,
    Tenant, Environment, Feed, ResourceType, Resource, MetricType, Metric,
};
pub use relationship::{Relationship, Direction, WellKnown};
pub use element::{Element, ElementKind, ElementVisitor};
pub use blueprint::{
    Blueprint, Update,
    TenantBlueprint, EnvironmentBlueprint, FeedBlueprint, ResourceTypeBlueprint,
    ResourceBlueprint, MetricTypeBlueprint, MetricBlueprint,
};
pub use value::Value;
pub use property_map::{PropertyMap, properties};
