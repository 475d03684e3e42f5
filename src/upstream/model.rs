use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Response headers this system retains from the upstream. Anything else
/// is dropped before the value ever reaches the cache or the client.
pub const RESPONSE_HEADER_ALLOWLIST: &[&str] = &[
    "cache-control",
    "etag",
    "last-modified",
    "expires",
    "vary",
    "content-encoding",
    "content-language",
    "content-disposition",
];

/// A cached or freshly-fetched upstream response, stripped to the fields
/// the rest of the system is allowed to retain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub headers: BTreeMap<String, String>,
}

impl UpstreamResponse {
    pub fn cache_control(&self) -> Option<&str> {
        self.headers.get("cache-control").map(String::as_str)
    }
}
