use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::types::secret::Secret;

/// Settings for the single fixed upstream this proxy fronts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: Url,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<Secret<String>>,
    pub timeout_seconds: u64,
    pub retries: u32,
    pub body_limit_bytes: usize,
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("http://localhost:3000")
                .expect("default upstream url is valid"),
            api_key: None,
            timeout_seconds: 10,
            retries: 1,
            body_limit_bytes: 1_048_576,
        }
    }
}
