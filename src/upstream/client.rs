use std::{collections::BTreeMap, time::Duration};

use reqwest::Method;
use url::Url;

use super::model::{UpstreamResponse, RESPONSE_HEADER_ALLOWLIST};
use crate::{
    config::upstream::UpstreamConfig,
    error::{init::ConfigError, internal::InternalError, invalid_req::InvalidRequestError, ApiError, InitError},
};

/// Talks to the single fixed upstream this proxy fronts. Constructed once
/// from [`UpstreamConfig`]; the base URL is validated to be origin-only at
/// construction so every later request can join paths against it without
/// re-checking.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
    timeout: Duration,
    retries: u32,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, InitError> {
        let origin_only = matches!(config.base_url.path(), "" | "/")
            && config.base_url.query().is_none()
            && config.base_url.fragment().is_none();
        if config.base_url.cannot_be_a_base() || !origin_only {
            return Err(InitError::Validation(ConfigError::InvalidUpstreamBaseUrl(
                config.base_url.to_string(),
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            api_key: config.api_key.as_ref().map(|s| s.expose().clone()),
            timeout: config.timeout(),
            retries: config.retries,
        })
    }

    pub fn server_api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    /// Performs a single outbound request, retrying idempotent GETs on
    /// transient failure. `path_with_query` must not smuggle an absolute
    /// URL (`http://`, `https://`, `//`) — that is rejected before any
    /// network activity.
    pub async fn request_raw(
        &self,
        method: &str,
        path_with_query: &str,
        body: Option<&serde_json::Value>,
        request_headers: &BTreeMap<String, String>,
    ) -> Result<UpstreamResponse, ApiError> {
        if path_with_query.starts_with("http://")
            || path_with_query.starts_with("https://")
            || path_with_query.starts_with("//")
        {
            return Err(InvalidRequestError::InvalidPath.into());
        }

        let url = self.join_url(path_with_query)?;
        let method = parse_method(method)?;
        let effective_attempts = if method == Method::GET { self.retries + 1 } else { 1 };

        let mut last_error: Option<InternalError> = None;
        for attempt in 0..effective_attempts {
            match self.dispatch_once(method.clone(), url.clone(), body, request_headers).await {
                Ok(response) => {
                    let transient_status = response.status >= 500;
                    if transient_status && method == Method::GET && attempt + 1 < effective_attempts {
                        continue;
                    }
                    return Ok(response);
                }
                Err(error) => {
                    let retryable = method == Method::GET && attempt + 1 < effective_attempts;
                    last_error = Some(error);
                    if !retryable {
                        break;
                    }
                }
            }
        }
        Err(last_error.expect("loop always dispatches at least once").into())
    }

    fn join_url(&self, path_with_query: &str) -> Result<Url, ApiError> {
        let joined = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path_with_query.trim_start_matches('/')
        );
        let url = Url::parse(&joined).map_err(|_| InvalidRequestError::InvalidPath)?;
        if url.origin() != self.base_url.origin() {
            return Err(InvalidRequestError::InvalidPath.into());
        }
        Ok(url)
    }

    async fn dispatch_once(
        &self,
        method: Method,
        url: Url,
        body: Option<&serde_json::Value>,
        request_headers: &BTreeMap<String, String>,
    ) -> Result<UpstreamResponse, InternalError> {
        let mut builder = self.http.request(method, url).timeout(self.timeout);
        for (name, value) in request_headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = body {
            builder = builder.header("content-type", "application/json").json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = allowlisted_headers(response.headers());
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let raw_body = response.bytes().await?;

        let body = decode_body(&raw_body, content_type.as_deref());

        Ok(UpstreamResponse {
            status: status.as_u16(),
            body,
            content_type,
            headers,
        })
    }
}

fn parse_method(method: &str) -> Result<Method, ApiError> {
    match method.to_ascii_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        _ => Err(InvalidRequestError::NotFound.into()),
    }
}

fn allowlisted_headers(headers: &reqwest::header::HeaderMap) -> BTreeMap<String, String> {
    let mut retained = BTreeMap::new();
    for name in RESPONSE_HEADER_ALLOWLIST {
        if let Some(value) = headers.get(*name)
            && let Ok(value) = value.to_str()
        {
            retained.insert((*name).to_string(), value.to_string());
        }
    }
    retained
}

fn decode_body(raw: &[u8], content_type: Option<&str>) -> serde_json::Value {
    if raw.is_empty() {
        return serde_json::Value::Null;
    }
    let is_json = content_type.is_some_and(|ct| ct.contains("application/json"));
    if is_json {
        match serde_json::from_slice(raw) {
            Ok(value) => return value,
            Err(error) => {
                tracing::warn!(%error, "upstream body claimed json but failed to parse, falling back to text");
            }
        }
    }
    serde_json::Value::String(String::from_utf8_lossy(raw).into_owned())
}

