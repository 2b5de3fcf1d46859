//! Response bodies. Domain entities already derive `Serialize` and are
//! returned as-is where no transformation is needed; this module only
//! holds shapes that don't map 1:1 onto a `contractor_core` entity.

use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: String,
    pub timestamp: i64,
    pub database: &'static str,
}

/// Returned once, at creation time, since the plaintext key is never
/// retrievable again — only its hash is persisted.
#[derive(Debug, Serialize)]
pub struct ApiKeyCreatedResponse {
    pub id: uuid::Uuid,
    pub team_id: uuid::Uuid,
    pub scope: contractor_core::entities::ApiScope,
    pub key: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// An API key without its hash — the safe shape for listing.
#[derive(Debug, Serialize)]
pub struct ApiKeySummary {
    pub id: uuid::Uuid,
    pub team_id: uuid::Uuid,
    pub scope: contractor_core::entities::ApiScope,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub revoked_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<contractor_core::entities::ApiKey> for ApiKeySummary {
    fn from(k: contractor_core::entities::ApiKey) -> Self {
        Self {
            id: k.id,
            team_id: k.team_id,
            scope: k.scope,
            created_at: k.created_at,
            revoked_at: k.revoked_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuditEventResponse {
    pub id: uuid::Uuid,
    pub entity_type: String,
    pub entity_id: uuid::Uuid,
    pub action: String,
    pub actor_id: uuid::Uuid,
    pub payload: serde_json::Value,
    pub occurred_at: chrono::DateTime<chrono::Utc>,
}

impl From<contractor_store::repository::AuditEvent> for AuditEventResponse {
    fn from(e: contractor_store::repository::AuditEvent) -> Self {
        Self {
            id: e.id,
            entity_type: e.entity_type,
            entity_id: e.entity_id,
            action: e.action,
            actor_id: e.actor_id,
            payload: e.payload,
            occurred_at: e.occurred_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuditPageResponse {
    pub events: Vec<AuditEventResponse>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CompareResponse {
    pub changes: Vec<contractor_core::differ::Change>,
    pub severity: contractor_core::entities::ChangeType,
    pub breaking: Vec<contractor_core::differ::Change>,
}
