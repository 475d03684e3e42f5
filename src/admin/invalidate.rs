use crate::{
    cache::{self, KeyHeaders},
    error::admin::AdminError,
    state_store::StateStore,
};

use super::{CACHE_NAMESPACE_PREFIX, DELETE_BATCH_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Exact,
    Prefix,
    All,
}

impl Scope {
    pub fn parse(raw: &str) -> Result<Self, AdminError> {
        match raw {
            "exact" => Ok(Self::Exact),
            "prefix" => Ok(Self::Prefix),
            "all" => Ok(Self::All),
            other => Err(AdminError::BadRequest(format!("unknown invalidation scope: {other}"))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Prefix => "prefix",
            Self::All => "all",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HeaderComponents {
    pub accept: Option<String>,
    pub accept_language: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Request {
    pub scope: Scope,
    pub path: Option<String>,
    pub path_prefix: Option<String>,
    pub strict: bool,
    pub headers: HeaderComponents,
    pub dry_run: bool,
}

/// What a [`Request`] resolves to: either a glob pattern consumed by a
/// cursor-based `SCAN`, or a single key checked with `EXISTS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Pattern(String),
    ExactKey(String),
}

/// Translates an admin invalidation request into the single cache-key
/// target it's allowed to touch. Never produces a pattern or key outside
/// [`CACHE_NAMESPACE_PREFIX`] — the key-registry namespace is structurally
/// unreachable from here.
pub fn build_target(request: &Request) -> Result<Target, AdminError> {
    match request.scope {
        Scope::All => Ok(Target::Pattern(format!("{CACHE_NAMESPACE_PREFIX}*"))),
        Scope::Prefix => {
            let prefix = request
                .path_prefix
                .as_deref()
                .ok_or_else(|| AdminError::BadRequest("pathPrefix is required for scope=prefix".to_string()))?;
            if prefix.contains('?') {
                return Err(AdminError::BadRequest("pathPrefix must not contain a query string".to_string()));
            }
            let normalized = normalize_prefix(prefix);
            Ok(Target::Pattern(format!("{CACHE_NAMESPACE_PREFIX}{}*", escape_glob(&normalized))))
        }
        Scope::Exact => {
            let path = request
                .path
                .as_deref()
                .ok_or_else(|| AdminError::BadRequest("path is required for scope=exact".to_string()))?;
            if request.strict {
                let key_headers = KeyHeaders {
                    accept: request.headers.accept.as_deref(),
                    accept_language: request.headers.accept_language.as_deref(),
                };
                let key = cache::build_key("GET", path, &key_headers, request.headers.api_key.as_deref());
                Ok(Target::ExactKey(key))
            } else {
                let normalized = normalize_path_preserving_query(path);
                Ok(Target::Pattern(format!("{CACHE_NAMESPACE_PREFIX}{}:*", escape_glob(&normalized))))
            }
        }
    }
}

/// Executes a [`Target`] against the state store: a cursor-based
/// scan-and-delete for patterns, a single `EXISTS`/`DEL` for an exact key.
/// Never issues a blocking full-keyspace enumeration.
pub async fn execute(store: &StateStore, target: &Target, dry_run: bool) -> Result<(u64, u64), AdminError> {
    match target {
        Target::Pattern(pattern) => {
            let result = store.scan_and_delete(pattern, DELETE_BATCH_SIZE, dry_run).await?;
            Ok((result.matched, result.deleted))
        }
        Target::ExactKey(key) => {
            let exists = store.exists(key).await?;
            if !exists {
                return Ok((0, 0));
            }
            if dry_run {
                return Ok((1, 0));
            }
            store.delete(key).await?;
            Ok((1, 1))
        }
    }
}

/// Force a leading slash, collapse runs of `//`, strip the trailing slash
/// (keeping the root `/` itself intact).
fn normalize_prefix(prefix: &str) -> String {
    let with_leading_slash = if prefix.starts_with('/') {
        prefix.to_string()
    } else {
        format!("/{prefix}")
    };
    let collapsed = collapse_double_slashes(&with_leading_slash);
    if collapsed.len() > 1 {
        collapsed.trim_end_matches('/').to_string()
    } else {
        collapsed
    }
}

/// Same leading-slash/collapse-slash normalization as [`normalize_prefix`],
/// but the query string (if any) is preserved verbatim after the `?`.
fn normalize_path_preserving_query(path: &str) -> String {
    match path.split_once('?') {
        Some((base, query)) => format!("{}?{}", normalize_prefix(base), query),
        None => normalize_prefix(path),
    }
}

fn collapse_double_slashes(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut previous_was_slash = false;
    for c in value.chars() {
        if c == '/' {
            if previous_was_slash {
                continue;
            }
            previous_was_slash = true;
        } else {
            previous_was_slash = false;
        }
        out.push(c);
    }
    out
}

/// Escapes Redis glob meta-characters (`\ * ? [ ]`) so a user-supplied
/// path segment is matched literally inside a `MATCH` pattern.
fn escape_glob(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '*' | '?' | '[' | ']') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_request(scope: Scope) -> Request {
        Request {
            scope,
            path: None,
            path_prefix: None,
            strict: false,
            headers: HeaderComponents::default(),
            dry_run: false,
        }
    }

    #[test]
    fn all_scope_targets_the_full_proxy_get_namespace() {
        let target = build_target(&base_request(Scope::All)).unwrap();
        assert_eq!(target, Target::Pattern("proxy:GET:*".to_string()));
    }

    #[test]
    fn prefix_scope_rejects_query_strings() {
        let mut request = base_request(Scope::Prefix);
        request.path_prefix = Some("/pst?x=1".to_string());
        assert!(build_target(&request).is_err());
    }

    #[test]
    fn prefix_scope_normalizes_and_escapes() {
        let mut request = base_request(Scope::Prefix);
        request.path_prefix = Some("pst//find/".to_string());
        let target = build_target(&request).unwrap();
        assert_eq!(target, Target::Pattern("proxy:GET:/pst/find*".to_string()));
    }

    #[test]
    fn prefix_scope_escapes_glob_metacharacters() {
        let mut request = base_request(Scope::Prefix);
        request.path_prefix = Some("/a*b".to_string());
        let target = build_target(&request).unwrap();
        assert_eq!(target, Target::Pattern("proxy:GET:/a\\*b*".to_string()));
    }

    #[test]
    fn exact_non_strict_matches_all_header_variants() {
        let mut request = base_request(Scope::Exact);
        request.path = Some("/pst/find?searchWord=x&areaId=10790".to_string());
        let target = build_target(&request).unwrap();
        assert_eq!(
            target,
            Target::Pattern("proxy:GET:/pst/find\\?searchWord=x&areaId=10790:*".to_string())
        );
    }

    #[test]
    fn exact_strict_recomputes_the_single_cache_key() {
        let mut request = base_request(Scope::Exact);
        request.path = Some("/pst/find?searchWord=x".to_string());
        request.strict = true;
        request.headers.accept = Some("*/*".to_string());
        let target = build_target(&request).unwrap();
        let expected = cache::build_key(
            "GET",
            "/pst/find?searchWord=x",
            &KeyHeaders { accept: Some("*/*"), accept_language: None },
            None,
        );
        assert_eq!(target, Target::ExactKey(expected));
    }

    #[test]
    fn unknown_scope_is_rejected() {
        assert!(Scope::parse("bogus").is_err());
    }
}
