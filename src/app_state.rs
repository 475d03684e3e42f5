use std::sync::Arc;

use crate::{
    cache::CacheStore,
    config::{admin::AdminConfig, cache::CacheConfig, keys::ApiKeysConfig, Config},
    error::init::InitError,
    keys::KeyRegistry,
    rate_limit::RateLimiter,
    state_store::{InMemoryStateStore, RedisStateStore, StateStore},
    upstream::UpstreamClient,
};

#[derive(Debug)]
pub struct InnerAppState {
    pub config: Config,
    pub state_store: StateStore,
    pub cache: CacheStore,
    pub cache_config: CacheConfig,
    pub keys_config: ApiKeysConfig,
    pub admin_config: AdminConfig,
    pub key_registry: KeyRegistry,
    pub rate_limiter: RateLimiter,
    pub upstream: UpstreamClient,
}

/// Shared, cheaply-cloneable application state. Every handler and
/// middleware holds one of these; the heavy pieces (pools, registries)
/// live once behind the `Arc`.
#[derive(Debug, Clone)]
pub struct AppState(pub Arc<InnerAppState>);

impl AppState {
    /// Builds the full dependency graph from configuration. Connects to
    /// Redis if configured; falls back to an in-memory store (and logs a
    /// warning) if the connection cannot be established at startup, per
    /// the fallback-mode design in the state-store contract.
    pub async fn build(config: Config) -> Result<Self, InitError> {
        let cache_config = config.cache();
        let keys_config = config.keys();
        let admin_config = config.admin();
        let upstream_config = config.upstream();

        let state_store = match &cache_config.redis {
            Some(redis_config) => {
                match RedisStateStore::new(redis_config.url.expose().clone(), redis_config.connection_timeout) {
                    Ok(store) => StateStore::Redis(store),
                    Err(error) => {
                        tracing::warn!(%error, "failed to connect to state store, running in fallback mode");
                        StateStore::InMemory(InMemoryStateStore::new())
                    }
                }
            }
            None => StateStore::InMemory(InMemoryStateStore::new()),
        };

        let cache = CacheStore::new(state_store.clone());
        let key_registry = KeyRegistry::new(state_store.clone(), keys_config.redis_prefix.clone());
        let rate_limiter = RateLimiter::new(state_store.clone(), keys_config.redis_prefix.clone());
        let upstream = UpstreamClient::new(&upstream_config)?;

        Ok(Self(Arc::new(InnerAppState {
            config,
            state_store,
            cache,
            cache_config,
            keys_config,
            admin_config,
            key_registry,
            rate_limiter,
            upstream,
        })))
    }

    pub fn config(&self) -> &Config {
        &self.0.config
    }
}
