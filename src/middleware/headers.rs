use std::collections::BTreeMap;

use http::HeaderMap;

/// Headers stripped unconditionally: the fixed hop-by-hop set plus
/// anything a proxy must never forward regardless of what the client
/// claims about its own routing.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
];

const FORWARDED_PREFIXES: &[&str] = &["x-forwarded-"];
const FORWARDED_EXACT: &str = "x-real-ip";

/// Headers retained for forwarding, beyond the `x-*` wildcard. `x-api-key`
/// is deliberately excluded even though it starts with `x-`: it is
/// consumed by authentication and never reaches the upstream.
const ALLOWLIST: &[&str] = &[
    "accept",
    "accept-encoding",
    "accept-language",
    "api_key",
    "authorization",
    "content-type",
    "user-agent",
];

const CLIENT_API_KEY_HEADER: &str = "x-api-key";

/// Extracts the client-presented API key, if any. This header is consumed
/// here and is never part of the forwarded header set.
pub fn extract_client_api_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CLIENT_API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn has_authorization(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| !v.trim().is_empty())
}

pub fn key_headers<'a>(headers: &'a HeaderMap) -> (Option<&'a str>, Option<&'a str>) {
    let accept = headers.get("accept").and_then(|v| v.to_str().ok());
    let accept_language = headers.get("accept-language").and_then(|v| v.to_str().ok());
    (accept, accept_language)
}

/// Normalizes and filters request headers into the set that may be
/// forwarded upstream: drops the hop-by-hop set, every `x-forwarded-*`/
/// `x-real-ip` header, every token the client itself listed in its
/// `connection` header, then retains only the allowlist (named headers
/// plus any `x-*` header, excluding `x-api-key`). Multi-value headers are
/// coalesced into a single comma-joined value.
pub fn normalize_and_filter(headers: &HeaderMap) -> BTreeMap<String, String> {
    let dynamic_hop_by_hop = connection_tokens(headers);

    let mut coalesced: BTreeMap<String, String> = BTreeMap::new();
    for name in headers.keys() {
        let name = name.as_str().to_lowercase();
        if is_dropped(&name, &dynamic_hop_by_hop) {
            continue;
        }
        let joined = headers
            .get_all(name.as_str())
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect::<Vec<_>>()
            .join(", ");
        coalesced.insert(name, joined);
    }

    coalesced
        .into_iter()
        .filter(|(name, _)| is_allowlisted(name))
        .collect()
}

fn connection_tokens(headers: &HeaderMap) -> Vec<String> {
    headers
        .get("connection")
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            v.split(',')
                .map(|token| token.trim().to_lowercase())
                .filter(|token| !token.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn is_dropped(name: &str, dynamic_hop_by_hop: &[String]) -> bool {
    HOP_BY_HOP.contains(&name)
        || FORWARDED_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
        || name == FORWARDED_EXACT
        || dynamic_hop_by_hop.iter().any(|token| token == name)
}

fn is_allowlisted(name: &str) -> bool {
    if name == CLIENT_API_KEY_HEADER {
        return false;
    }
    ALLOWLIST.contains(&name) || name.starts_with("x-")
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;

    use super::*;

    fn headers_from(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(
                http::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        headers
    }

    #[test]
    fn drops_fixed_hop_by_hop_and_forwarded_headers() {
        let headers = headers_from(&[
            ("host", "example.com"),
            ("content-length", "10"),
            ("x-forwarded-for", "1.2.3.4"),
            ("x-real-ip", "1.2.3.4"),
            ("accept", "application/json"),
        ]);
        let filtered = normalize_and_filter(&headers);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.get("accept").unwrap(), "application/json");
    }

    #[test]
    fn drops_tokens_named_in_connection_header() {
        let headers = headers_from(&[
            ("connection", "x-custom-hop"),
            ("x-custom-hop", "should-be-dropped"),
            ("accept", "*/*"),
        ]);
        let filtered = normalize_and_filter(&headers);
        assert!(!filtered.contains_key("x-custom-hop"));
        assert!(filtered.contains_key("accept"));
    }

    #[test]
    fn client_api_key_is_extracted_but_never_forwarded() {
        let headers = headers_from(&[("x-api-key", "secret"), ("x-request-id", "abc")]);
        assert_eq!(extract_client_api_key(&headers).as_deref(), Some("secret"));
        let filtered = normalize_and_filter(&headers);
        assert!(!filtered.contains_key("x-api-key"));
        assert!(filtered.contains_key("x-request-id"));
    }

    #[test]
    fn drops_headers_outside_the_allowlist() {
        let headers = headers_from(&[("cookie", "session=abc"), ("accept", "*/*")]);
        let filtered = normalize_and_filter(&headers);
        assert!(!filtered.contains_key("cookie"));
        assert!(filtered.contains_key("accept"));
    }
}
