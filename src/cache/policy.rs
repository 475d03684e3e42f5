use std::collections::HashMap;

use crate::hash::sha256_hex;

/// Inputs to [`build_key`] pulled from the subset of request headers the
/// cache key is allowed to depend on.
#[derive(Debug, Clone, Default)]
pub struct KeyHeaders<'a> {
    pub accept: Option<&'a str>,
    pub accept_language: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheDecision {
    pub cacheable: bool,
    pub ttl_seconds: Option<u64>,
    pub stale_ttl_seconds: Option<u64>,
}

impl CacheDecision {
    fn not_cacheable() -> Self {
        Self {
            cacheable: false,
            ttl_seconds: None,
            stale_ttl_seconds: None,
        }
    }

    fn cacheable_with_ttl(ttl_seconds: Option<u64>) -> Self {
        Self {
            cacheable: true,
            ttl_seconds,
            stale_ttl_seconds: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DecideOptions {
    pub ignore_upstream_control: bool,
}

fn normalize(value: Option<&str>) -> String {
    value.map(str::trim).unwrap_or_default().to_lowercase()
}

/// Builds the cache key `"proxy:" + METHOD + ":" + PATH_WITH_QUERY + ":" +
/// headerFingerprint`. The raw `api_key`, if present, never appears in the
/// output — only a salted hash of it, mixed with method and path so a
/// single key can't be confirmed valid by comparing cache hits across
/// endpoints.
pub fn build_key(
    method: &str,
    path_with_query: &str,
    headers: &KeyHeaders<'_>,
    api_key: Option<&str>,
) -> String {
    let credential_salt = match api_key {
        Some(key) if !key.is_empty() => {
            sha256_hex(&format!("{method}:{path_with_query}:{key}"))
        }
        _ => String::new(),
    };
    let fingerprint = format!(
        "{}|{}|{}",
        normalize(headers.accept),
        normalize(headers.accept_language),
        credential_salt
    );
    format!("proxy:{method}:{path_with_query}:{fingerprint}")
}

/// Parses a `cache-control`-style header value into a directive map.
/// Comma-separated; `key=value` pairs keep their value (quotes stripped);
/// bare tokens map to `"true"`.
fn parse_directives(value: &str) -> HashMap<String, String> {
    let mut directives = HashMap::new();
    for part in value.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        match part.split_once('=') {
            Some((key, val)) => {
                let val = val.trim().trim_matches('"');
                directives.insert(key.trim().to_lowercase(), val.to_string());
            }
            None => {
                directives.insert(part.to_lowercase(), "true".to_string());
            }
        }
    }
    directives
}

/// Decides cacheability and TTL per the ordered rule list: status
/// exclusions first, then an `ignoreUpstreamControl` override, then
/// `cache-control` parsing (`no-store`/`private` reject, `s-maxage` then
/// `max-age` resolve a TTL), finally an unset-TTL cacheable default.
pub fn decide(
    status: u16,
    cache_control: Option<&str>,
    options: DecideOptions,
) -> CacheDecision {
    if status == 204 || status == 304 {
        return CacheDecision::not_cacheable();
    }
    if !(200..300).contains(&status) {
        return CacheDecision::not_cacheable();
    }
    if options.ignore_upstream_control {
        return CacheDecision::cacheable_with_ttl(None);
    }

    let Some(cache_control) = cache_control else {
        return CacheDecision::cacheable_with_ttl(None);
    };
    let directives = parse_directives(cache_control);

    if directives.contains_key("no-store") || directives.contains_key("private") {
        return CacheDecision::not_cacheable();
    }

    for key in ["s-maxage", "max-age"] {
        if let Some(raw) = directives.get(key)
            && let Ok(value) = raw.parse::<f64>()
        {
            let ttl = value.floor();
            if ttl <= 0.0 {
                return CacheDecision::not_cacheable();
            }
            return CacheDecision::cacheable_with_ttl(Some(ttl as u64));
        }
    }

    CacheDecision::cacheable_with_ttl(None)
}

/// Path with query stripped, leading slash enforced, trailing slashes
/// collapsed — matches the normalization `shouldBypass` expects.
pub fn normalize_base_path(path: &str) -> String {
    let without_query = path.split('?').next().unwrap_or("");
    let mut normalized = if without_query.starts_with('/') {
        without_query.to_string()
    } else {
        format!("/{without_query}")
    };
    while normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }
    if normalized.is_empty() {
        normalized.push('/');
    }
    normalized
}

/// A request bypasses the cache entirely (never read, never written) when
/// it carries a non-empty `authorization` header, or its path matches a
/// configured bypass prefix.
pub fn should_bypass(
    has_authorization: bool,
    base_path: &str,
    bypass_path_prefixes: &[String],
) -> bool {
    if has_authorization {
        return true;
    }
    let base_path = normalize_base_path(base_path);
    bypass_path_prefixes.iter().any(|prefix| {
        if prefix == "/" {
            return true;
        }
        base_path == *prefix || base_path.starts_with(&format!("{prefix}/"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_key_never_contains_the_raw_api_key() {
        let headers = KeyHeaders {
            accept: Some("*/*"),
            accept_language: Some("de-DE"),
        };
        let key = build_key("GET", "/pst/find?x=1", &headers, Some("super-secret-key"));
        assert!(!key.contains("super-secret-key"));
    }

    #[test]
    fn build_key_is_deterministic_and_sensitive_to_api_key() {
        let headers = KeyHeaders::default();
        let a = build_key("GET", "/p", &headers, Some("key-a"));
        let b = build_key("GET", "/p", &headers, Some("key-a"));
        let c = build_key("GET", "/p", &headers, Some("key-b"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn build_key_is_case_insensitive_for_accept_headers() {
        let upper = KeyHeaders {
            accept: Some("APPLICATION/JSON"),
            accept_language: Some("DE-DE"),
        };
        let lower = KeyHeaders {
            accept: Some("application/json"),
            accept_language: Some("de-de"),
        };
        assert_eq!(
            build_key("GET", "/p", &upper, None),
            build_key("GET", "/p", &lower, None)
        );
    }

    #[test]
    fn decide_rejects_204_and_304() {
        let opts = DecideOptions { ignore_upstream_control: false };
        assert!(!decide(204, None, opts).cacheable);
        assert!(!decide(304, None, opts).cacheable);
    }

    #[test]
    fn decide_rejects_non_2xx() {
        let opts = DecideOptions { ignore_upstream_control: false };
        assert!(!decide(404, None, opts).cacheable);
        assert!(!decide(500, None, opts).cacheable);
    }

    #[test]
    fn decide_honors_ignore_upstream_control() {
        let opts = DecideOptions { ignore_upstream_control: true };
        let decision = decide(200, Some("no-store"), opts);
        assert!(decision.cacheable);
        assert_eq!(decision.ttl_seconds, None);
    }

    #[test]
    fn decide_rejects_no_store_and_private() {
        let opts = DecideOptions { ignore_upstream_control: false };
        assert!(!decide(200, Some("no-store"), opts).cacheable);
        assert!(!decide(200, Some("private"), opts).cacheable);
    }

    #[test]
    fn decide_resolves_ttl_from_s_maxage_then_max_age() {
        let opts = DecideOptions { ignore_upstream_control: false };
        let both = decide(200, Some("max-age=10, s-maxage=20"), opts);
        assert_eq!(both.ttl_seconds, Some(20));

        let max_age_only = decide(200, Some("max-age=60"), opts);
        assert_eq!(max_age_only.ttl_seconds, Some(60));
    }

    #[test]
    fn decide_rejects_non_positive_ttl() {
        let opts = DecideOptions { ignore_upstream_control: false };
        assert!(!decide(200, Some("max-age=0"), opts).cacheable);
    }

    #[test]
    fn decide_is_cacheable_with_unset_ttl_when_no_directive_present() {
        let opts = DecideOptions { ignore_upstream_control: false };
        let decision = decide(200, None, opts);
        assert!(decision.cacheable);
        assert_eq!(decision.ttl_seconds, None);
    }

    #[test]
    fn should_bypass_on_authorization_header() {
        assert!(should_bypass(true, "/anything", &[]));
    }

    #[test]
    fn should_bypass_on_matching_prefix() {
        let prefixes = vec!["/admin".to_string()];
        assert!(should_bypass(false, "/admin/x", &prefixes));
        assert!(should_bypass(false, "/admin", &prefixes));
        assert!(!should_bypass(false, "/administration", &prefixes));
    }

    #[test]
    fn should_bypass_root_prefix_matches_everything() {
        let prefixes = vec!["/".to_string()];
        assert!(should_bypass(false, "/anything/at/all", &prefixes));
    }
}
