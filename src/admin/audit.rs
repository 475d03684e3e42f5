use std::net::IpAddr;

use http::HeaderMap;

/// Who/where an admin action came from, threaded through to the audit log
/// line. `identity` is never the raw bearer token — only its fingerprint,
/// computed once by [`crate::middleware::admin::require_admin`].
#[derive(Debug, Clone)]
pub struct Context {
    pub identity: String,
    pub ip: IpAddr,
    pub request_id: Option<String>,
}

impl Context {
    pub fn from_parts(identity: &str, ip: IpAddr, headers: &HeaderMap) -> Self {
        Self {
            identity: identity.to_string(),
            ip,
            request_id: headers
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        }
    }
}

/// Emits exactly one structured audit line per admin action. Success logs
/// at `info`, failure at `warn`; neither ever carries the raw bearer token
/// or a raw API key — only fingerprints and record identifiers.
pub fn log(event: &str, action: &str, ok: bool, ctx: &Context, fields: serde_json::Value) {
    let result = if ok { "ok" } else { "error" };
    if ok {
        tracing::info!(
            event,
            action,
            result,
            admin_identity = %ctx.identity,
            ip = %ctx.ip,
            request_id = ctx.request_id.as_deref().unwrap_or_default(),
            fields = %fields,
            "admin action",
        );
    } else {
        tracing::warn!(
            event,
            action,
            result,
            admin_identity = %ctx.identity,
            ip = %ctx.ip,
            request_id = ctx.request_id.as_deref().unwrap_or_default(),
            fields = %fields,
            "admin action",
        );
    }
}
