use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Extension, Path, State},
    Json,
};
use http::{HeaderMap, StatusCode};
use serde_json::json;
use uuid::Uuid;

use crate::{app_state::AppState, error::admin::AdminError, keys::NewApiKey, middleware::admin::AdminIdentity, state_store::StateStore};

use super::{
    audit,
    invalidate::{self, Scope},
    model::{
        ApiKeyListItem, ApiKeyListResponse, CreateApiKeyRequest, CreateApiKeyResponse, InvalidateRequestBody,
        InvalidateResponseBody, OkResponse,
    },
};

fn ctx(identity: &AdminIdentity, addr: SocketAddr, headers: &HeaderMap) -> audit::Context {
    audit::Context::from_parts(&identity.0, addr.ip(), headers)
}

pub async fn create_api_key(
    State(app_state): State<AppState>,
    Extension(identity): Extension<AdminIdentity>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<CreateApiKeyRequest>,
) -> Result<(StatusCode, Json<CreateApiKeyResponse>), AdminError> {
    let audit_ctx = ctx(&identity, addr, &headers);
    if body.owner.trim().is_empty() {
        audit::log("api_key.create", "create", false, &audit_ctx, json!({"reason": "empty owner"}));
        return Err(AdminError::BadRequest("owner must not be empty".to_string()));
    }

    let (raw_key, record) = app_state
        .0
        .key_registry
        .create(NewApiKey {
            owner: body.owner,
            label: body.label,
            contact: body.contact,
            created_by: body.created_by,
            expires_at: body.expires_at,
        })
        .await?;

    audit::log("api_key.create", "create", true, &audit_ctx, json!({"keyId": record.key_id}));

    Ok((
        StatusCode::CREATED,
        Json(CreateApiKeyResponse {
            key_id: record.key_id,
            api_key: raw_key,
            owner: record.owner,
            label: record.label,
            contact: record.contact,
            created_at: record.created_at,
            created_by: record.created_by,
            expires_at: record.expires_at,
            revoked: record.revoked,
        }),
    ))
}

pub async fn list_api_keys(
    State(app_state): State<AppState>,
    Extension(identity): Extension<AdminIdentity>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Json<ApiKeyListResponse>, AdminError> {
    let audit_ctx = ctx(&identity, addr, &headers);
    let records = app_state.0.key_registry.list().await?;
    audit::log("api_key.list", "list", true, &audit_ctx, json!({"count": records.len()}));
    Ok(Json(ApiKeyListResponse {
        items: records.into_iter().map(ApiKeyListItem::from).collect(),
    }))
}

pub async fn revoke_api_key(
    State(app_state): State<AppState>,
    Extension(identity): Extension<AdminIdentity>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(key_id): Path<Uuid>,
) -> Result<Json<OkResponse>, AdminError> {
    let audit_ctx = ctx(&identity, addr, &headers);
    let found = app_state.0.key_registry.revoke(key_id).await?;
    audit::log("api_key.revoke", "revoke", found, &audit_ctx, json!({"keyId": key_id}));
    if !found {
        return Err(AdminError::NotFound);
    }
    Ok(Json(OkResponse::new()))
}

pub async fn activate_api_key(
    State(app_state): State<AppState>,
    Extension(identity): Extension<AdminIdentity>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(key_id): Path<Uuid>,
) -> Result<Json<OkResponse>, AdminError> {
    let audit_ctx = ctx(&identity, addr, &headers);
    let found = app_state.0.key_registry.activate(key_id).await?;
    audit::log("api_key.activate", "activate", found, &audit_ctx, json!({"keyId": key_id}));
    if !found {
        return Err(AdminError::NotFound);
    }
    Ok(Json(OkResponse::new()))
}

pub async fn delete_api_key(
    State(app_state): State<AppState>,
    Extension(identity): Extension<AdminIdentity>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(key_id): Path<Uuid>,
) -> Result<Json<OkResponse>, AdminError> {
    let audit_ctx = ctx(&identity, addr, &headers);
    let found = app_state.0.key_registry.delete(key_id).await?;
    audit::log("api_key.delete", "delete", found, &audit_ctx, json!({"keyId": key_id}));
    if !found {
        return Err(AdminError::NotFound);
    }
    Ok(Json(OkResponse::new()))
}

pub async fn invalidate_cache(
    State(app_state): State<AppState>,
    Extension(identity): Extension<AdminIdentity>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<InvalidateRequestBody>,
) -> Result<Json<InvalidateResponseBody>, AdminError> {
    let audit_ctx = ctx(&identity, addr, &headers);
    let scope = Scope::parse(&body.scope)?;
    let dry_run = body.dry_run.unwrap_or(false);

    let request = invalidate::Request {
        scope,
        path: body.path,
        path_prefix: body.path_prefix,
        strict: body.strict.unwrap_or(false),
        headers: invalidate::HeaderComponents {
            accept: body.headers.as_ref().and_then(|h| h.accept.clone()),
            accept_language: body.headers.as_ref().and_then(|h| h.accept_language.clone()),
            api_key: body.headers.as_ref().and_then(|h| h.api_key.clone()),
        },
        dry_run,
    };

    let target = match invalidate::build_target(&request) {
        Ok(target) => target,
        Err(error) => {
            audit::log(
                "cache.invalidate",
                "invalidate",
                false,
                &audit_ctx,
                json!({"scope": scope.as_str(), "reason": error.to_string()}),
            );
            return Err(error);
        }
    };

    if matches!(&app_state.0.state_store, StateStore::InMemory(_)) {
        audit::log(
            "cache.invalidate",
            "invalidate",
            false,
            &audit_ctx,
            json!({"scope": scope.as_str(), "reason": "state store unreachable"}),
        );
        return Err(AdminError::ServiceUnavailable);
    }

    let (matched, deleted) = invalidate::execute(&app_state.0.state_store, &target, dry_run).await?;

    audit::log(
        "cache.invalidate",
        "invalidate",
        true,
        &audit_ctx,
        json!({"scope": scope.as_str(), "dryRun": dry_run, "matched": matched, "deleted": deleted}),
    );

    Ok(Json(InvalidateResponseBody {
        ok: true,
        scope: scope.as_str().to_string(),
        dry_run,
        matched,
        deleted,
    }))
}
