//! `GET /api/v1/audit` — keyset-paginated, filterable audit log reads.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use contractor_store::repository::AuditFilter;
use uuid::Uuid;

use crate::error::{ApiError, Result};
use crate::models::request::AuditQuery;
use crate::models::response::{AuditEventResponse, AuditPageResponse};
use crate::state::AppState;

pub async fn query_audit(
    State(state): State<Arc<AppState>>,
    Query(q): Query<AuditQuery>,
) -> Result<Json<AuditPageResponse>> {
    let after = q
        .cursor
        .as_deref()
        .map(decode_cursor)
        .transpose()
        .map_err(|e| ApiError::Validation(format!("invalid cursor: {e}")))?;

    let filter = AuditFilter {
        entity_type: q.entity_type,
        entity_id: q.entity_id,
        actor_id: q.actor_id,
        action: q.action,
        after,
        limit: q.limit,
    };

    let page = state.repo.query_audit(&filter).await?;

    Ok(Json(AuditPageResponse {
        events: page.events.into_iter().map(AuditEventResponse::from).collect(),
        next_cursor: page.next_cursor.map(|(ts, id)| encode_cursor(ts, id)),
    }))
}

/// Cursors are opaque to the client but not encrypted — just a
/// `timestamp|id` pair, percent-encoded on the wire like any other
/// query value. Good enough for a keyset cursor nobody needs to hide.
fn encode_cursor(ts: DateTime<Utc>, id: Uuid) -> String {
    format!("{}|{id}", ts.to_rfc3339())
}

fn decode_cursor(raw: &str) -> anyhow::Result<(DateTime<Utc>, Uuid)> {
    let (ts_str, id_str) = raw
        .split_once('|')
        .ok_or_else(|| anyhow::anyhow!("malformed cursor"))?;
    Ok((DateTime::parse_from_rfc3339(ts_str)?.with_timezone(&Utc), Uuid::parse_str(id_str)?))
}
