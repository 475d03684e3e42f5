use serde::{Deserialize, Serialize};

use super::redis::RedisConfig;

/// Cache behavior. `redis` is `None` when `CACHE_REDIS_URL` is unset; in
/// that case the store starts in fallback (in-memory, non-shared) mode.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis: Option<RedisConfig>,
    pub ttl_default_seconds: u64,
    pub stale_ttl_seconds: u64,
    pub ignore_upstream_control: bool,
    pub bypass_paths: Vec<String>,
    pub debug: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis: None,
            ttl_default_seconds: 60,
            stale_ttl_seconds: 30,
            ignore_upstream_control: false,
            bypass_paths: Vec::new(),
            debug: false,
        }
    }
}
