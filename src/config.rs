//! Inventory configuration.
//!
//! ```rust
//! use infra_inventory::{Configuration, Element};
//!
//! let config = Configuration::builder()
//!     .with_result_filter(|e: &Element| !e.id().starts_with("hidden-"))
//!     .with_property("memory.snapshot-dir", "/tmp/inventory")
//!     .build();
//!
//! assert_eq!(config.property("memory.snapshot-dir"), Some("/tmp/inventory"));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::model::{CanonicalPath, Element};
use crate::storage::{BackendConfig, BackendProperties};

// ============================================================================
// Pluggable policies
// ============================================================================

/// Decides the id of a newly registered feed.
pub trait FeedIdStrategy: Send + Sync {
    /// `environment` is the feed's parent; `proposed` is the id the feed
    /// asked for, if any.
    fn generate(&self, environment: &CanonicalPath, proposed: Option<&str>) -> String;
}

/// Keeps the proposed id; feeds without one get a random UUID.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProposedOrRandomFeedIds;

impl FeedIdStrategy for ProposedOrRandomFeedIds {
    fn generate(&self, _environment: &CanonicalPath, proposed: Option<&str>) -> String {
        match proposed {
            Some(id) => id.to_owned(),
            None => Uuid::new_v4().to_string(),
        }
    }
}

/// Hides elements from every read result.
pub trait ResultFilter: Send + Sync {
    fn is_applicable(&self, element: &Element) -> bool;
}

impl<F> ResultFilter for F
where
    F: Fn(&Element) -> bool + Send + Sync,
{
    fn is_applicable(&self, element: &Element) -> bool {
        self(element)
    }
}

// ============================================================================
// Configuration
// ============================================================================

#[derive(Clone)]
pub struct Configuration {
    feed_id_strategy: Arc<dyn FeedIdStrategy>,
    result_filter: Option<Arc<dyn ResultFilter>>,
    backend: BackendConfig,
    properties: BackendProperties,
}

impl Configuration {
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::default()
    }

    pub fn feed_id_strategy(&self) -> &dyn FeedIdStrategy {
        self.feed_id_strategy.as_ref()
    }

    pub fn result_filter(&self) -> Option<&dyn ResultFilter> {
        self.result_filter.as_deref()
    }

    /// Whether `element` passes the result filter. Without a filter
    /// everything is applicable.
    pub fn is_applicable(&self, element: &Element) -> bool {
        self.result_filter.as_ref().is_none_or(|f| f.is_applicable(element))
    }

    pub fn backend(&self) -> &BackendConfig {
        &self.backend
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn properties(&self) -> &BackendProperties {
        &self.properties
    }
}

impl Default for Configuration {
    fn default() -> Self {
        ConfigurationBuilder::default().build()
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("result_filter", &self.result_filter.is_some())
            .field("backend", &self.backend)
            .field("properties", &self.properties)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct ConfigurationBuilder {
    feed_id_strategy: Option<Arc<dyn FeedIdStrategy>>,
    result_filter: Option<Arc<dyn ResultFilter>>,
    backend: BackendConfig,
    properties: HashMap<String, String>,
}

impl ConfigurationBuilder {
    pub fn with_feed_id_strategy(mut self, strategy: impl FeedIdStrategy + 'static) -> Self {
        self.feed_id_strategy = Some(Arc::new(strategy));
        self
    }

    pub fn with_result_filter(mut self, filter: impl ResultFilter + 'static) -> Self {
        self.result_filter = Some(Arc::new(filter));
        self
    }

    pub fn with_backend(mut self, backend: BackendConfig) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Configuration {
        Configuration {
            feed_id_strategy: self.feed_id_strategy.unwrap_or_else(|| Arc::new(ProposedOrRandomFeedIds)),
            result_filter: self.result_filter,
            backend: self.backend,
            properties: self.properties,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Entity, Tenant};

    fn env() -> CanonicalPath {
        CanonicalPath::builder().tenant("t").environment("e").build().unwrap()
    }

    #[test]
    fn test_default_feed_ids() {
        let config = Configuration::default();
        let strategy = config.feed_id_strategy();
        assert_eq!(strategy.generate(&env(), Some("agent-1")), "agent-1");

        let generated = strategy.generate(&env(), None);
        assert!(Uuid::parse_str(&generated).is_ok());
    }

    #[test]
    fn test_custom_feed_ids() {
        struct Prefixed;
        impl FeedIdStrategy for Prefixed {
            fn generate(&self, environment: &CanonicalPath, proposed: Option<&str>) -> String {
                format!("{}-{}", environment.id(), proposed.unwrap_or("feed"))
            }
        }

        let config = Configuration::builder().with_feed_id_strategy(Prefixed).build();
        assert_eq!(config.feed_id_strategy().generate(&env(), None), "e-feed");
    }

    #[test]
    fn test_result_filter_closure() {
        let config = Configuration::builder()
            .with_result_filter(|e: &Element| e.id() != "secret")
            .build();
        let tenant = |id: &str| {
            Element::Entity(Entity::Tenant(Tenant {
                path: CanonicalPath::tenant(id).unwrap(),
                properties: Default::default(),
            }))
        };

        assert!(config.is_applicable(&tenant("public")));
        assert!(!config.is_applicable(&tenant("secret")));
        assert!(Configuration::default().is_applicable(&tenant("secret")));
    }

    #[test]
    fn test_backend_properties() {
        let config = Configuration::builder()
            .with_backend(BackendConfig::external("graph-db"))
            .with_property("url", "bolt://localhost")
            .build();
        assert_eq!(config.backend(), &BackendConfig::external("graph-db"));
        assert_eq!(config.property("url"), Some("bolt://localhost"));
        assert_eq!(config.property("missing"), None);
    }
}
