//! `/api/v1/assets` and the asset-scoped contract/compare/impact endpoints.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use contractor_core::audit::{action, entity};
use contractor_core::classifier::classify;
use contractor_core::coordinator::{PublishCoordinator, PublishOutcome, PublishRequest};
use contractor_core::differ::diff;
use contractor_core::entities::{Asset, Contract};
use contractor_core::impact::impact;
use contractor_core::ports::{Clock, IdGenerator, NewAuditEvent, Store};
use contractor_core::schema::SchemaNode;
use semver::Version;
use uuid::Uuid;

use crate::error::{ApiError, Result};
use crate::models::request::{CompareRequest, CreateAssetRequest, ListAssetsQuery, PublishContractRequest};
use crate::models::response::CompareResponse;
use crate::state::AppState;

pub async fn create_asset(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateAssetRequest>,
) -> Result<Json<Asset>> {
    if req.fqn.trim().is_empty() {
        return Err(ApiError::Validation("fqn is required".into()));
    }

    let asset = Asset {
        id: state.ids.new_id(),
        fqn: req.fqn,
        owner_team_id: req.owner_team_id,
        resource_type: req.resource_type,
        current_contract_id: None,
        metadata: req.metadata,
        deleted_at: None,
    };

    let mut tx = state.begin().await?;
    if tx.get_asset_by_fqn(&asset.fqn).await?.is_some() {
        tx.rollback().await?;
        return Err(ApiError::Conflict(format!(
            "an asset with fqn {} already exists",
            asset.fqn
        )));
    }
    tx.insert_asset(&asset).await?;
    tx.append_audit(NewAuditEvent {
        entity_type: entity::ASSET,
        entity_id: asset.id,
        action: action::ASSET_CREATED,
        actor_id: asset.owner_team_id,
        payload: serde_json::json!({ "fqn": asset.fqn }),
        occurred_at: state.clock.now(),
    })
    .await?;
    tx.commit().await?;

    Ok(Json(asset))
}

pub async fn list_assets(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ListAssetsQuery>,
) -> Result<Json<Vec<Asset>>> {
    Ok(Json(state.repo.list_assets(q.owner_team_id).await?))
}

pub async fn get_asset(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Asset>> {
    let asset = state
        .repo
        .get_asset(id)
        .await?
        .filter(|a| !a.is_deleted())
        .ok_or_else(|| ApiError::NotFound(format!("asset {id} not found")))?;
    Ok(Json(asset))
}

pub async fn delete_asset(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    let asset = state
        .repo
        .get_asset(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("asset {id} not found")))?;

    let now = state.clock.now();
    let mut tx = state.begin().await?;
    tx.soft_delete_asset(id, now).await?;
    tx.append_audit(NewAuditEvent {
        entity_type: entity::ASSET,
        entity_id: id,
        action: action::ASSET_DELETED,
        actor_id: asset.owner_team_id,
        payload: serde_json::json!({}),
        occurred_at: now,
    })
    .await?;
    tx.commit().await?;

    Ok(Json(serde_json::json!({ "deleted": true })))
}

/// `POST /api/v1/assets/:id/contracts` — the publish coordinator entry point.
pub async fn publish_contract(
    State(state): State<Arc<AppState>>,
    Path(asset_id): Path<Uuid>,
    Json(req): Json<PublishContractRequest>,
) -> Result<Json<PublishOutcome>> {
    let version = Version::parse(&req.version)
        .map_err(|e| ApiError::Validation(format!("invalid version: {e}")))?;

    let publish_req = PublishRequest {
        asset_id,
        proposed_schema: req.schema,
        proposed_version: version,
        compatibility_mode: req.compatibility_mode,
        publisher_team_id: req.publisher_team_id,
        force: req.force,
        guarantees: req.guarantees,
    };

    let coordinator = PublishCoordinator::new(state.clock.as_ref(), state.ids.as_ref(), state.notifier.as_ref());
    let mut tx = state.begin().await?;
    let outcome = coordinator.publish(tx.as_mut(), publish_req).await;
    match outcome {
        Ok(outcome) => {
            tx.commit().await?;
            Ok(Json(outcome))
        }
        Err(e) => {
            tx.rollback().await?;
            Err(e.into())
        }
    }
}

pub async fn list_contracts(
    State(state): State<Arc<AppState>>,
    Path(asset_id): Path<Uuid>,
) -> Result<Json<Vec<Contract>>> {
    Ok(Json(state.repo.list_contracts(asset_id).await?))
}

pub async fn get_contract(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Contract>> {
    let mut tx = state.begin().await?;
    let contract = tx
        .get_contract(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("contract {id} not found")))?;
    tx.rollback().await?;
    Ok(Json(contract))
}

/// `POST /api/v1/assets/:id/compare` — pure diff/classify, no mutation.
pub async fn compare(
    State(state): State<Arc<AppState>>,
    Path(asset_id): Path<Uuid>,
    Json(req): Json<CompareRequest>,
) -> Result<Json<CompareResponse>> {
    let mut tx = state.begin().await?;
    let asset = tx
        .get_asset(asset_id)
        .await?
        .filter(|a| !a.is_deleted())
        .ok_or_else(|| ApiError::NotFound(format!("asset {asset_id} not found")))?;
    let current = tx.get_active_contract(asset.id).await?;
    tx.rollback().await?;

    let current = current
        .ok_or_else(|| ApiError::Validation("asset has no active contract to compare against".into()))?;

    let old_node = SchemaNode::parse_root(&current.schema)
        .map_err(|e| ApiError::Validation(e.to_string()))?;
    let new_node = SchemaNode::parse_root(&req.proposed_schema)
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let changes = diff(&old_node, &new_node);
    let mode = req.compatibility_mode.unwrap_or(current.compatibility_mode);
    let classification = classify(&changes, mode);

    Ok(Json(CompareResponse {
        changes,
        severity: classification.severity.into(),
        breaking: classification.breaking,
    }))
}

/// `GET /api/v1/assets/:id/impact`
pub async fn get_impact(
    State(state): State<Arc<AppState>>,
    Path(asset_id): Path<Uuid>,
    Query(q): Query<ImpactQuery>,
) -> Result<Json<contractor_core::impact::ImpactReport>> {
    let proposed_schema: serde_json::Value = match &q.proposed_schema {
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| ApiError::Validation(format!("invalid proposed_schema: {e}")))?,
        None => {
            let mut tx = state.begin().await?;
            let current = tx
                .get_active_contract(asset_id)
                .await?
                .ok_or_else(|| ApiError::Validation("asset has no active contract".into()))?;
            tx.rollback().await?;
            current.schema
        }
    };

    let mode = q.compatibility_mode.unwrap_or_default();
    let mut tx = state.begin().await?;
    let report = impact(tx.as_mut(), asset_id, &proposed_schema, mode).await?;
    tx.rollback().await?;

    Ok(Json(report))
}

#[derive(Debug, serde::Deserialize)]
pub struct ImpactQuery {
    pub proposed_schema: Option<String>,
    pub compatibility_mode: Option<contractor_core::entities::CompatibilityMode>,
}
