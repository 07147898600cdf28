//! Ability configuration

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Environment variable toggling the lookup cache
pub const ENV_ENABLE_CACHE: &str = "ABILITY_ENABLE_CACHE";

/// Environment variable setting the lookup cache capacity
pub const ENV_CACHE_CAPACITY: &str = "ABILITY_CACHE_CAPACITY";

/// Ability configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbilityConfig {
    /// Memoize candidate rule lists per (subject, action)
    pub enable_cache: bool,

    /// Maximum memoized keys before the cache is flushed
    pub cache_capacity: usize,
}

impl Default for AbilityConfig {
    fn default() -> Self {
        Self {
            enable_cache: true,
            cache_capacity: 10_000,
        }
    }
}

impl AbilityConfig {
    /// Read the configuration from the environment
    ///
    /// Absent variables keep their default; unparsable ones are logged and
    /// ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_ENABLE_CACHE) {
            match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => config.enable_cache = true,
                "0" | "false" | "no" | "off" => config.enable_cache = false,
                other => warn!("Ignoring {}={}: expected a boolean", ENV_ENABLE_CACHE, other),
            }
        }

        if let Some(raw) = lookup(ENV_CACHE_CAPACITY) {
            match raw.trim().parse() {
                Ok(capacity) => config.cache_capacity = capacity,
                Err(e) => warn!("Ignoring {}={}: {}", ENV_CACHE_CAPACITY, raw, e),
            }
        }

        config
    }
}
