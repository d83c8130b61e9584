use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Engine settings. Every field has a default, so a partial document
/// deserializes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Page used when a filter has none
    pub default_page: u64,
    /// Page size used when a filter has none, or asks for 0
    pub default_limit: u64,
    /// Upper bound for page sizes
    pub max_limit: Option<u64>,
    /// Actor recorded on system-owned records written outside a user context
    pub system_actor_id: Uuid,
    /// Log a warning when a filter compiles to more alternative groups than this
    pub or_group_warn_threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_page: 1,
            default_limit: 10,
            max_limit: None,
            system_actor_id: Uuid::nil(),
            or_group_warn_threshold: 64,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn with_default_limit(mut self, limit: u64) -> Self {
        self.default_limit = limit;
        self
    }

    #[must_use]
    pub fn with_max_limit(mut self, limit: u64) -> Self {
        self.max_limit = Some(limit);
        self
    }

    #[must_use]
    pub fn with_system_actor(mut self, actor: Uuid) -> Self {
        self.system_actor_id = actor;
        self
    }

    #[must_use]
    pub fn with_or_group_warn_threshold(mut self, threshold: usize) -> Self {
        self.or_group_warn_threshold = threshold;
        self
    }
}
