use displaydoc::Display;
use thiserror::Error;

/// Startup-time failures. Any of these cause the process to refuse to
/// start rather than run in a half-configured state.
#[derive(Debug, Error, Display)]
pub enum InitError {
    /// failed to load configuration: {0}
    Config(#[from] config::ConfigError),
    /// invalid configuration: {0}
    Validation(#[from] ConfigError),
    /// failed to build the state store connection pool: {0}
    Pool(#[from] r2d2::Error),
    /// failed to build the upstream http client: {0}
    HttpClient(#[from] reqwest::Error),
}

/// Semantic validation failures on an otherwise well-formed config.
#[derive(Debug, Error, Display)]
pub enum ConfigError {
    /// HTTP_CLIENT_BASE_URL must be an absolute origin-only url (no path, query, or fragment): {0}
    InvalidUpstreamBaseUrl(String),
    /// ADMIN_API_TOKEN must not be empty
    EmptyAdminToken,
    /// PROXY_BODY_LIMIT must be greater than zero
    InvalidBodyLimit,
    /// HTTP_CLIENT_RETRIES must be representable as a small non-negative count
    InvalidRetries,
    /// API_KEYS_RATE_LIMIT_WINDOW_SECONDS must be greater than zero
    InvalidRateLimitWindow,
    /// API_KEYS_RATE_LIMIT_MAX_REQUESTS must be greater than zero
    InvalidRateLimitMax,
}
