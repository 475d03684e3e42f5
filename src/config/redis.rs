use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::types::secret::Secret;

/// Connection settings for the Redis-backed state store. Absent entirely
/// when `CACHE_REDIS_URL` isn't set, in which case the process starts in
/// fallback mode with an in-memory store.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisConfig {
    pub url: Secret<Url>,
    #[serde(with = "humantime_duration", default = "default_connection_timeout")]
    pub connection_timeout: Duration,
}

fn default_connection_timeout() -> Duration {
    Duration::from_secs(5)
}

mod humantime_duration {
    use std::time::Duration;

    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Duration,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
