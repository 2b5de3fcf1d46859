//! `/api/v1/teams`

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use contractor_core::audit::{action, entity};
use contractor_core::entities::Team;
use contractor_core::ports::{Clock, IdGenerator, NewAuditEvent};
use uuid::Uuid;

use crate::error::{ApiError, Result};
use crate::models::request::CreateTeamRequest;
use crate::state::AppState;

pub async fn create_team(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTeamRequest>,
) -> Result<Json<Team>> {
    if req.name.trim().is_empty() || req.slug.trim().is_empty() {
        return Err(ApiError::Validation("name and slug are required".into()));
    }

    let team = Team {
        id: state.ids.new_id(),
        name: req.name,
        slug: req.slug,
        metadata: req.metadata,
        created_at: state.clock.now(),
        deleted_at: None,
    };

    let mut tx = state.begin().await?;
    tx.insert_team(&team).await?;
    tx.append_audit(NewAuditEvent {
        entity_type: entity::TEAM,
        entity_id: team.id,
        action: action::TEAM_CREATED,
        actor_id: team.id,
        payload: serde_json::json!({ "slug": team.slug }),
        occurred_at: team.created_at,
    })
    .await?;
    tx.commit().await?;

    Ok(Json(team))
}

pub async fn list_teams(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Team>>> {
    Ok(Json(state.repo.list_teams().await?))
}

pub async fn get_team(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Team>> {
    let team = state
        .repo
        .get_team(id)
        .await?
        .filter(|t| !t.is_deleted())
        .ok_or_else(|| ApiError::NotFound(format!("team {id} not found")))?;
    Ok(Json(team))
}

pub async fn delete_team(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    state
        .repo
        .get_team(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("team {id} not found")))?;

    let now = state.clock.now();
    let mut tx = state.begin().await?;
    tx.soft_delete_team(id, now).await?;
    tx.append_audit(NewAuditEvent {
        entity_type: entity::TEAM,
        entity_id: id,
        action: action::TEAM_DELETED,
        actor_id: id,
        payload: serde_json::json!({}),
        occurred_at: now,
    })
    .await?;
    tx.commit().await?;

    Ok(Json(serde_json::json!({ "deleted": true })))
}
