//! Element: anything stored in the inventory graph.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::entity::{Environment, Feed, Metric, MetricType, Resource, ResourceType, Tenant};
use super::{Entity, EntityKind, Relationship};

/// Kind of a stored element: an entity kind, or a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ElementKind {
    Entity(EntityKind),
    Relationship,
}

impl From<EntityKind> for ElementKind {
    fn from(kind: EntityKind) -> Self {
        ElementKind::Entity(kind)
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementKind::Entity(kind) => write!(f, "{kind}"),
            ElementKind::Relationship => f.write_str("relationship"),
        }
    }
}

/// An entity or a relationship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Element {
    Entity(Entity),
    Relationship(Relationship),
}

impl Element {
    pub fn kind(&self) -> ElementKind {
        match self {
            Element::Entity(e) => ElementKind::Entity(e.kind()),
            Element::Relationship(_) => ElementKind::Relationship,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Element::Entity(e) => e.id(),
            Element::Relationship(r) => &r.id,
        }
    }

    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Element::Entity(e) => Some(e),
            Element::Relationship(_) => None,
        }
    }

    pub fn as_relationship(&self) -> Option<&Relationship> {
        match self {
            Element::Relationship(r) => Some(r),
            Element::Entity(_) => None,
        }
    }

    /// Dispatch to the visitor method matching the variant.
    pub fn accept<V: ElementVisitor>(&self, visitor: &mut V) -> V::Output {
        match self {
            Element::Entity(Entity::Tenant(e)) => visitor.visit_tenant(e),
            Element::Entity(Entity::Environment(e)) => visitor.visit_environment(e),
            Element::Entity(Entity::Feed(e)) => visitor.visit_feed(e),
            Element::Entity(Entity::ResourceType(e)) => visitor.visit_resource_type(e),
            Element::Entity(Entity::Resource(e)) => visitor.visit_resource(e),
            Element::Entity(Entity::MetricType(e)) => visitor.visit_metric_type(e),
            Element::Entity(Entity::Metric(e)) => visitor.visit_metric(e),
            Element::Relationship(r) => visitor.visit_relationship(r),
        }
    }
}

impl From<Entity> for Element {
    fn from(e: Entity) -> Self {
        Element::Entity(e)
    }
}

impl From<Relationship> for Element {
    fn from(r: Relationship) -> Self {
        Element::Relationship(r)
    }
}

/// Typed visitor over [`Element`] variants.
pub trait ElementVisitor {
    type Output;

    fn visit_tenant(&mut self, tenant: &Tenant) -> Self::Output;
    fn visit_environment(&mut self, environment: &Environment) -> Self::Output;
    fn visit_feed(&mut self, feed: &Feed) -> Self::Output;
    fn visit_resource_type(&mut self, resource_type: &ResourceType) -> Self::Output;
    fn visit_resource(&mut self, resource: &Resource) -> Self::Output;
    fn visit_metric_type(&mut self, metric_type: &MetricType) -> Self::Output;
    fn visit_metric(&mut self, metric: &Metric) -> Self::Output;
    fn visit_relationship(&mut self, relationship: &Relationship) -> Self::Output;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CanonicalPath, PropertyMap};

    struct Describe;

    impl ElementVisitor for Describe {
        type Output = String;

        fn visit_tenant(&mut self, t: &Tenant) -> String { format!("tenant {}", t.id()) }
        fn visit_environment(&mut self, e: &Environment) -> String { format!("env {}", e.id()) }
        fn visit_feed(&mut self, f: &Feed) -> String { format!("feed {}", f.id()) }
        fn visit_resource_type(&mut self, rt: &ResourceType) -> String { format!("type {}@{}", rt.id(), rt.version) }
        fn visit_resource(&mut self, r: &Resource) -> String { format!("resource {}", r.id()) }
        fn visit_metric_type(&mut self, mt: &MetricType) -> String { format!("metric type {}", mt.id()) }
        fn visit_metric(&mut self, m: &Metric) -> String { format!("metric {}", m.id()) }
        fn visit_relationship(&mut self, r: &Relationship) -> String { format!("rel {}", r.name) }
    }

    #[test]
    fn test_visitor_dispatch() {
        let path = CanonicalPath::builder().tenant("t").resource_type("rt").build().unwrap();
        let rt = Element::from(Entity::ResourceType(ResourceType {
            path: path.clone(),
            version: "1".into(),
            properties: PropertyMap::new(),
        }));
        assert_eq!(rt.accept(&mut Describe), "type rt@1");
        assert_eq!(rt.kind(), ElementKind::Entity(EntityKind::ResourceType));

        let rel = Element::from(Relationship::new("x", "defines", path.root(), path));
        assert_eq!(rel.accept(&mut Describe), "rel defines");
        assert_eq!(rel.id(), "x");
    }
}
