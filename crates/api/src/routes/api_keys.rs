//! `/api/v1/api-keys` — admin-scoped key issuance and revocation.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use contractor_core::audit::{action, entity};
use contractor_core::entities::ApiKey;
use contractor_core::ports::{Clock, NewAuditEvent};
use uuid::Uuid;

use crate::error::{ApiError, Result};
use crate::middleware::auth::{generate_key, hash_key};
use crate::models::request::CreateApiKeyRequest;
use crate::models::response::{ApiKeyCreatedResponse, ApiKeySummary};
use crate::state::AppState;

pub async fn create_api_key(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateApiKeyRequest>,
) -> Result<Json<ApiKeyCreatedResponse>> {
    state
        .repo
        .get_team(req.team_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("team {} not found", req.team_id)))?;

    let plaintext = generate_key();
    let key = ApiKey {
        id: Uuid::new_v4(),
        team_id: req.team_id,
        scope: req.scope,
        key_hash: hash_key(&plaintext),
        created_at: state.clock.now(),
        revoked_at: None,
    };

    let mut tx = state.begin().await?;
    tx.insert_api_key(&key).await?;
    tx.append_audit(NewAuditEvent {
        entity_type: entity::API_KEY,
        entity_id: key.id,
        action: action::API_KEY_CREATED,
        actor_id: key.team_id,
        payload: serde_json::json!({ "scope": key.scope }),
        occurred_at: key.created_at,
    })
    .await?;
    tx.commit().await?;

    Ok(Json(ApiKeyCreatedResponse {
        id: key.id,
        team_id: key.team_id,
        scope: key.scope,
        key: plaintext,
        created_at: key.created_at,
    }))
}

pub async fn list_api_keys(
    State(state): State<Arc<AppState>>,
    axum::extract::Query(q): axum::extract::Query<TeamQuery>,
) -> Result<Json<Vec<ApiKeySummary>>> {
    let keys = state.repo.list_api_keys(q.team_id).await?;
    Ok(Json(keys.into_iter().map(ApiKeySummary::from).collect()))
}

#[derive(Debug, serde::Deserialize)]
pub struct TeamQuery {
    pub team_id: Uuid,
}

pub async fn revoke_api_key(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    let key = state
        .repo
        .get_api_key(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("api key {id} not found")))?;

    let now = state.clock.now();
    let mut tx = state.begin().await?;
    tx.revoke_api_key(id, now).await?;
    tx.append_audit(NewAuditEvent {
        entity_type: entity::API_KEY,
        entity_id: id,
        action: action::API_KEY_REVOKED,
        actor_id: key.team_id,
        payload: serde_json::json!({}),
        occurred_at: now,
    })
    .await?;
    tx.commit().await?;

    Ok(Json(serde_json::json!({ "revoked": true })))
}
