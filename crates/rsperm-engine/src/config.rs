//! Configuration management for the permission engine.
//!
//! Configuration is loaded from three sources, lowest precedence first:
//! 1. Default values (hardcoded)
//! 2. Configuration file (YAML)
//! 3. Environment variables (override)
//!
//! Environment variables use the `RSPERM_` prefix with `__` as the nested
//! key separator, e.g. `RSPERM_CACHE__ENABLED=false` or
//! `RSPERM_POLICY__DEFAULT_GROUP=member`.

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use rsperm_domain::cache::ResolutionCacheConfig;
use rsperm_domain::resolver::ResolverConfig;

/// Engine configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct EngineConfig {
    /// Resolution cache settings
    #[serde(default)]
    pub cache: CacheSettings,

    /// Cross-instance sync settings
    #[serde(default)]
    pub sync: SyncSettings,

    /// Permission policy settings
    #[serde(default)]
    pub policy: PolicySettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl EngineConfig {
    /// Loads configuration from a YAML file with environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_string_lossy().to_string();
        Config::builder()
            .add_source(File::new(&path, FileFormat::Yaml).required(false))
            .add_source(Environment::with_prefix("RSPERM").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// Loads configuration from environment variables only.
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("RSPERM").separator("__"))
            .build()?
            .try_deserialize()
    }
}

/// Resolution cache settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CacheSettings {
    /// Whether resolved-permission caching is enabled
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    /// Maximum number of cached (holder, context) resolutions
    #[serde(default = "default_cache_capacity")]
    pub max_capacity: u64,

    /// Entry time-to-live in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            max_capacity: default_cache_capacity(),
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl From<&CacheSettings> for ResolutionCacheConfig {
    fn from(settings: &CacheSettings) -> Self {
        ResolutionCacheConfig::default()
            .with_enabled(settings.enabled)
            .with_max_capacity(settings.max_capacity)
            .with_ttl(Duration::from_secs(settings.ttl_secs))
    }
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_capacity() -> u64 {
    50_000
}

fn default_cache_ttl_secs() -> u64 {
    600
}

/// Cross-instance sync settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SyncSettings {
    /// Bound on a single publish, in milliseconds. A slow or broken
    /// transport must not stall the mutation path.
    #[serde(default = "default_publish_timeout_ms")]
    pub publish_timeout_ms: u64,

    /// Interval of the periodic full resync with storage, in seconds.
    /// The backstop for lost messages.
    #[serde(default = "default_resync_interval_secs")]
    pub resync_interval_secs: u64,

    /// How many received audit entries to retain for display.
    #[serde(default = "default_recent_log_capacity")]
    pub recent_log_capacity: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            publish_timeout_ms: default_publish_timeout_ms(),
            resync_interval_secs: default_resync_interval_secs(),
            recent_log_capacity: default_recent_log_capacity(),
        }
    }
}

impl SyncSettings {
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }

    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs)
    }
}

fn default_publish_timeout_ms() -> u64 {
    2_000
}

fn default_resync_interval_secs() -> u64 {
    180
}

fn default_recent_log_capacity() -> usize {
    128
}

/// Permission policy settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PolicySettings {
    /// Group every user implicitly belongs to when it has no explicit
    /// membership node.
    #[serde(default = "default_default_group")]
    pub default_group: String,

    /// Refuse to unset a user's membership node for their stored primary
    /// group in the global context.
    #[serde(default)]
    pub prevent_primary_group_removal: bool,

    /// Maximum inheritance traversal depth.
    #[serde(default = "default_max_inheritance_depth")]
    pub max_inheritance_depth: u32,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            default_group: default_default_group(),
            prevent_primary_group_removal: false,
            max_inheritance_depth: default_max_inheritance_depth(),
        }
    }
}

impl From<&PolicySettings> for ResolverConfig {
    fn from(settings: &PolicySettings) -> Self {
        ResolverConfig::default()
            .with_max_depth(settings.max_inheritance_depth)
            .with_default_group(Some(settings.default_group.clone()))
    }
}

fn default_default_group() -> String {
    "default".to_string()
}

fn default_max_inheritance_depth() -> u32 {
    25
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingSettings {
    /// Emit JSON-formatted logs (production) instead of text.
    #[serde(default)]
    pub json: bool,

    /// Default level if RUST_LOG is not set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            json: false,
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.cache.enabled);
        assert_eq!(config.policy.default_group, "default");
        assert!(!config.policy.prevent_primary_group_removal);
        assert_eq!(config.sync.publish_timeout(), Duration::from_millis(2_000));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_cache_settings_convert() {
        let settings = CacheSettings {
            enabled: false,
            max_capacity: 10,
            ttl_secs: 5,
        };
        let cache_config = ResolutionCacheConfig::from(&settings);
        assert!(!cache_config.enabled);
        assert_eq!(cache_config.max_capacity, 10);
        assert_eq!(cache_config.time_to_live, Duration::from_secs(5));
    }

    #[test]
    fn test_policy_settings_convert() {
        let settings = PolicySettings {
            default_group: "Member".to_string(),
            prevent_primary_group_removal: true,
            max_inheritance_depth: 7,
        };
        let resolver_config = ResolverConfig::from(&settings);
        assert_eq!(resolver_config.max_depth, 7);
        assert_eq!(resolver_config.default_group.as_deref(), Some("member"));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = EngineConfig::load("/nonexistent/rsperm.yaml").unwrap();
        assert_eq!(config, EngineConfig::default());
    }
}
