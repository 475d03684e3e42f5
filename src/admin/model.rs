use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::keys::ApiKeyRecord;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateApiKeyRequest {
    pub owner: String,
    pub label: Option<String>,
    pub contact: Option<String>,
    pub created_by: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateApiKeyResponse {
    pub key_id: Uuid,
    pub api_key: String,
    pub owner: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked: bool,
}

/// An [`ApiKeyRecord`] shape safe to list: carries everything except the
/// key hash, which never leaves the registry.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyListItem {
    pub key_id: Uuid,
    pub owner: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    pub revoked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<ApiKeyRecord> for ApiKeyListItem {
    fn from(record: ApiKeyRecord) -> Self {
        Self {
            key_id: record.key_id,
            owner: record.owner,
            label: record.label,
            contact: record.contact,
            created_at: record.created_at,
            created_by: record.created_by,
            revoked: record.revoked,
            revoked_at: record.revoked_at,
            expires_at: record.expires_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiKeyListResponse {
    pub items: Vec<ApiKeyListItem>,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub fn new() -> Self {
        Self { ok: true }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidateHeadersBody {
    pub accept: Option<String>,
    pub accept_language: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidateRequestBody {
    pub scope: String,
    pub path: Option<String>,
    pub path_prefix: Option<String>,
    pub strict: Option<bool>,
    pub headers: Option<InvalidateHeadersBody>,
    pub dry_run: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidateResponseBody {
    pub ok: bool,
    pub scope: String,
    pub dry_run: bool,
    pub matched: u64,
    pub deleted: u64,
}
