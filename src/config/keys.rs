use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiKeysConfig {
    pub redis_prefix: String,
    pub rate_limit_window_seconds: u64,
    pub rate_limit_max_requests: u64,
}

impl Default for ApiKeysConfig {
    fn default() -> Self {
        Self {
            redis_prefix: "proxy".to_string(),
            rate_limit_window_seconds: 60,
            rate_limit_max_requests: 120,
        }
    }
}
