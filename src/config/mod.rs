pub mod admin;
pub mod cache;
pub mod keys;
pub mod redis;
pub mod upstream;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    error::init::{ConfigError, InitError},
    types::secret::Secret,
};

/// Flat configuration surface, one field per environment variable in the
/// wire interface. Loaded once at startup via [`Config::try_read`] and
/// never re-read.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub port: u16,
    pub log_level: String,

    pub http_client_base_url: Url,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_client_api_key: Option<Secret<String>>,
    pub http_client_timeout: u64,
    pub http_client_retries: u32,

    pub proxy_body_limit: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_redis_url: Option<Secret<Url>>,
    pub cache_ttl_default: u64,
    pub cache_stale_ttl: u64,
    pub cache_ignore_upstream_control: bool,
    pub cache_bypass_paths: Vec<String>,
    pub cache_debug: bool,

    pub api_keys_redis_prefix: String,
    pub api_keys_rate_limit_window_seconds: u64,
    pub api_keys_rate_limit_max_requests: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_api_token: Option<Secret<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            log_level: "info".to_string(),
            http_client_base_url: Url::parse("http://localhost:3000")
                .expect("default upstream url is valid"),
            http_client_api_key: None,
            http_client_timeout: 10,
            http_client_retries: 1,
            proxy_body_limit: 1_048_576,
            cache_redis_url: None,
            cache_ttl_default: 60,
            cache_stale_ttl: 30,
            cache_ignore_upstream_control: false,
            cache_bypass_paths: Vec::new(),
            cache_debug: false,
            api_keys_redis_prefix: "proxy".to_string(),
            api_keys_rate_limit_window_seconds: 60,
            api_keys_rate_limit_max_requests: 120,
            admin_api_token: None,
        }
    }
}

impl Config {
    /// Loads configuration from the environment, layered over the defaults
    /// above. `.env` (if present) has already been loaded into the process
    /// environment by the caller via `dotenvy::dotenv()`.
    pub fn try_read() -> Result<Self, InitError> {
        let default_config = serde_json::to_value(Self::default())
            .expect("default config is serializable");

        let builder = config::Config::builder()
            .add_source(config::Environment::default().try_parsing(true));
        let env_config: serde_json::Value = builder
            .build()?
            .try_deserialize()
            .unwrap_or(serde_json::Value::Object(serde_json::Map::new()));

        let mut merged = default_config;
        json_merge(&mut merged, &env_config);

        let config: Config = serde_json::from_value(merged).map_err(|e| {
            InitError::Config(config::ConfigError::Message(e.to_string()))
        })?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), InitError> {
        let url = &self.http_client_base_url;
        let origin_only = matches!(url.path(), "" | "/")
            && url.query().is_none()
            && url.fragment().is_none();
        if url.cannot_be_a_base() || !origin_only {
            return Err(InitError::Validation(
                ConfigError::InvalidUpstreamBaseUrl(
                    self.http_client_base_url.to_string(),
                ),
            ));
        }
        if let Some(token) = &self.admin_api_token
            && token.expose().is_empty()
        {
            return Err(InitError::Validation(ConfigError::EmptyAdminToken));
        }
        if self.proxy_body_limit == 0 {
            return Err(InitError::Validation(ConfigError::InvalidBodyLimit));
        }
        if self.http_client_retries > 10 {
            return Err(InitError::Validation(ConfigError::InvalidRetries));
        }
        if self.api_keys_rate_limit_window_seconds == 0 {
            return Err(InitError::Validation(
                ConfigError::InvalidRateLimitWindow,
            ));
        }
        if self.api_keys_rate_limit_max_requests == 0 {
            return Err(InitError::Validation(ConfigError::InvalidRateLimitMax));
        }
        Ok(())
    }

    pub fn upstream(&self) -> upstream::UpstreamConfig {
        upstream::UpstreamConfig {
            base_url: self.http_client_base_url.clone(),
            api_key: self.http_client_api_key.clone(),
            timeout_seconds: self.http_client_timeout,
            retries: self.http_client_retries,
            body_limit_bytes: self.proxy_body_limit,
        }
    }

    pub fn cache(&self) -> cache::CacheConfig {
        cache::CacheConfig {
            redis: self.cache_redis_url.as_ref().map(|url| redis::RedisConfig {
                url: Secret::from(url.expose().clone()),
                connection_timeout: std::time::Duration::from_secs(5),
            }),
            ttl_default_seconds: self.cache_ttl_default,
            stale_ttl_seconds: self.cache_stale_ttl,
            ignore_upstream_control: self.cache_ignore_upstream_control,
            bypass_paths: self.cache_bypass_paths.clone(),
            debug: self.cache_debug,
        }
    }

    pub fn keys(&self) -> keys::ApiKeysConfig {
        keys::ApiKeysConfig {
            redis_prefix: self.api_keys_redis_prefix.clone(),
            rate_limit_window_seconds: self.api_keys_rate_limit_window_seconds,
            rate_limit_max_requests: self.api_keys_rate_limit_max_requests,
        }
    }

    pub fn admin(&self) -> admin::AdminConfig {
        admin::AdminConfig {
            api_token: self.admin_api_token.clone(),
        }
    }
}

/// Minimal recursive JSON merge: `overlay` wins wherever it defines a key.
/// Used instead of pulling in `json-patch` for a single call site.
fn json_merge(base: &mut serde_json::Value, overlay: &serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(base_map), serde_json::Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                json_merge(
                    base_map.entry(key.clone()).or_insert(serde_json::Value::Null),
                    value,
                );
            }
        }
        (base, overlay) => {
            *base = overlay.clone();
        }
    }
}
