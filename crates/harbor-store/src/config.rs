//! Construction-time configuration for [`EntityStore`].
//!
//! [`EntityStore`]: crate::EntityStore

use chrono::Duration;

/// Store configuration, passed at construction.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Resource kind used in `NotFound` errors (e.g. `"task"`).
    pub resource: String,
    /// Default lifespan applied to every insert. `None` means live forever.
    pub default_ttl: Option<Duration>,
    /// Hard cap on live entities. `None` means unbounded.
    pub max_entities: Option<usize>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            resource: "entity".to_string(),
            default_ttl: None,
            max_entities: None,
        }
    }
}

impl StoreConfig {
    /// Config for a named resource kind with no TTL and no cap.
    #[must_use]
    pub fn for_resource(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            ..Self::default()
        }
    }

    /// Set the default TTL applied to inserts.
    #[must_use]
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    /// Set the hard cap on live entities.
    #[must_use]
    pub fn with_max_entities(mut self, max: usize) -> Self {
        self.max_entities = Some(max);
        self
    }
}
