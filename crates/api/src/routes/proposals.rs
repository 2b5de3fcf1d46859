//! `/api/v1/proposals` and its lifecycle actions.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use contractor_core::coordinator::PublishCoordinator;
use contractor_core::entities::Proposal;
use contractor_core::proposal::ProposalLifecycle;
use uuid::Uuid;

use crate::error::{ApiError, Result};
use crate::models::request::{AcknowledgeRequest, ActorRequest, WithdrawRequest};
use crate::state::AppState;

pub async fn list_proposals(
    State(state): State<Arc<AppState>>,
    axum::extract::Query(q): axum::extract::Query<AssetQuery>,
) -> Result<Json<Vec<Proposal>>> {
    Ok(Json(state.repo.list_proposals(q.asset_id).await?))
}

#[derive(Debug, serde::Deserialize)]
pub struct AssetQuery {
    pub asset_id: Uuid,
}

pub async fn get_proposal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Proposal>> {
    let proposal = state
        .repo
        .get_proposal(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("proposal {id} not found")))?;
    Ok(Json(proposal))
}

pub async fn acknowledge(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<AcknowledgeRequest>,
) -> Result<Json<Proposal>> {
    let lifecycle = ProposalLifecycle::new(state.clock.as_ref(), state.ids.as_ref());
    let mut tx = state.begin().await?;
    let proposal = lifecycle
        .acknowledge(tx.as_mut(), id, req.consumer_team_id, req.response, req.notes, req.migration_deadline)
        .await?;
    tx.commit().await?;
    Ok(Json(proposal))
}

pub async fn withdraw(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<WithdrawRequest>,
) -> Result<Json<Proposal>> {
    let lifecycle = ProposalLifecycle::new(state.clock.as_ref(), state.ids.as_ref());
    let mut tx = state.begin().await?;
    let proposal = lifecycle
        .withdraw(tx.as_mut(), id, req.actor_id, req.actor_is_admin)
        .await?;
    tx.commit().await?;
    Ok(Json(proposal))
}

pub async fn force(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<ActorRequest>,
) -> Result<Json<Proposal>> {
    let lifecycle = ProposalLifecycle::new(state.clock.as_ref(), state.ids.as_ref());
    let mut tx = state.begin().await?;
    let proposal = lifecycle.force(tx.as_mut(), id, req.actor_id).await?;
    tx.commit().await?;
    Ok(Json(proposal))
}

pub async fn publish(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<ActorRequest>,
) -> Result<Json<Proposal>> {
    let lifecycle = ProposalLifecycle::new(state.clock.as_ref(), state.ids.as_ref());
    let coordinator = PublishCoordinator::new(state.clock.as_ref(), state.ids.as_ref(), state.notifier.as_ref());
    let mut tx = state.begin().await?;
    let result = lifecycle.publish(tx.as_mut(), &coordinator, id, req.actor_id).await;
    match result {
        Ok(proposal) => {
            tx.commit().await?;
            Ok(Json(proposal))
        }
        // A stale base contract rejects and persists the proposal as
        // `rejected` before surfacing the conflict — that write must
        // survive even though the request itself failed.
        Err(e @ contractor_core::CoreError::ConflictPersisted(_)) => {
            tx.commit().await?;
            Err(e.into())
        }
        Err(e) => {
            tx.rollback().await?;
            Err(e.into())
        }
    }
}
