use crate::error::Error;
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

/// Prefix for environment overrides, e.g. `REQUEST_DEDUP_CACHE__DEFAULT_TTL_MS=2000`.
pub const ENV_PREFIX: &str = "REQUEST_DEDUP_";

/// Configuration for the response cache
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
    /// Lifetime of a cached response unless a call overrides it
    pub default_ttl_ms: u64,
    /// Maximum number of cached entries
    pub max_entries: usize,
    /// Whether caching is enabled
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_ms: 5_000,
            max_entries: 1000,
            enabled: true,
        }
    }
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }
}

/// Configuration for in-flight request deduplication
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DeduplicationConfig {
    /// How long a pending request is tracked before it is considered leaked
    pub request_timeout_ms: u64,
    /// Whether deduplication is enabled
    pub enabled: bool,
}

impl Default for DeduplicationConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 30_000,
            enabled: true,
        }
    }
}

impl DeduplicationConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub deduplication: DeduplicationConfig,
    /// Run a sweep of stale entries once every this many `execute` calls (0 disables)
    pub sweep_every: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            deduplication: DeduplicationConfig::default(),
            sweep_every: 10,
        }
    }
}

impl Config {
    /// Defaults, overridden by a YAML file, overridden by the environment.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        Ok(Self::figment()
            .merge(Yaml::file(path))
            .merge(Self::env())
            .extract()?)
    }

    pub fn from_env() -> Result<Self, Error> {
        Ok(Self::figment().merge(Self::env()).extract()?)
    }

    fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
    }

    fn env() -> Env {
        Env::prefixed(ENV_PREFIX).split("__")
    }
}
