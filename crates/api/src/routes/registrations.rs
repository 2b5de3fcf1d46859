//! `/api/v1/registrations`

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use contractor_core::audit::{action, entity};
use contractor_core::entities::{Registration, RegistrationStatus};
use contractor_core::ports::{Clock, IdGenerator, NewAuditEvent};
use semver::Version;
use uuid::Uuid;

use crate::error::{ApiError, Result};
use crate::models::request::{CreateRegistrationRequest, UpdateRegistrationRequest};
use crate::state::AppState;

pub async fn create_registration(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateRegistrationRequest>,
) -> Result<Json<Registration>> {
    let pinned_version = req
        .pinned_version
        .map(|v| Version::parse(&v))
        .transpose()
        .map_err(|e| ApiError::Validation(format!("invalid pinned_version: {e}")))?;

    let mut tx = state.begin().await?;
    let asset = tx
        .get_asset(req.asset_id)
        .await?
        .filter(|a| !a.is_deleted())
        .ok_or_else(|| ApiError::NotFound(format!("asset {} not found", req.asset_id)))?;

    let registration = Registration {
        id: state.ids.new_id(),
        asset_id: asset.id,
        consumer_team_id: req.consumer_team_id,
        pinned_version,
        status: RegistrationStatus::Active,
        registered_at: state.clock.now(),
    };

    tx.insert_registration(&registration).await?;
    tx.append_audit(NewAuditEvent {
        entity_type: entity::REGISTRATION,
        entity_id: registration.id,
        action: action::REGISTRATION_CREATED,
        actor_id: registration.consumer_team_id,
        payload: serde_json::json!({ "asset_id": registration.asset_id }),
        occurred_at: registration.registered_at,
    })
    .await?;
    tx.commit().await?;

    Ok(Json(registration))
}

pub async fn list_registrations_for_consumer(
    State(state): State<Arc<AppState>>,
    axum::extract::Query(q): axum::extract::Query<ConsumerQuery>,
) -> Result<Json<Vec<Registration>>> {
    Ok(Json(
        state.repo.list_registrations_for_consumer(q.consumer_team_id).await?,
    ))
}

#[derive(Debug, serde::Deserialize)]
pub struct ConsumerQuery {
    pub consumer_team_id: Uuid,
}

pub async fn update_registration(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateRegistrationRequest>,
) -> Result<Json<Registration>> {
    let registration = state
        .repo
        .get_registration(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("registration {id} not found")))?;

    let mut tx = state.begin().await?;
    tx.update_registration_status(id, req.status).await?;
    tx.append_audit(NewAuditEvent {
        entity_type: entity::REGISTRATION,
        entity_id: id,
        action: action::REGISTRATION_STATUS_CHANGED,
        actor_id: registration.consumer_team_id,
        payload: serde_json::json!({ "from": registration.status, "to": req.status }),
        occurred_at: state.clock.now(),
    })
    .await?;
    tx.commit().await?;

    Ok(Json(Registration { status: req.status, ..registration }))
}
