//! Request bodies and response shapes for the HTTP surface.
//!
//! Entities that round-trip unchanged (`Team`, `Asset`, `Contract`, ...) are
//! reused directly from `contractor_core`; only the shapes specific to this
//! wire format live here.

use chrono::{DateTime, Utc};
use contractor_core::entities::{ApiScope, CompatibilityMode, Guarantees, ResourceType};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct CreateTeamRequest {
    pub name: String,
    pub slug: String,
    #[serde(default, skip_serializing_if = "std::collections::HashMap::is_empty")]
    pub metadata: std::collections::HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateAssetRequest {
    pub fqn: String,
    pub owner_team_id: Uuid,
    pub resource_type: ResourceType,
    #[serde(default, skip_serializing_if = "std::collections::HashMap::is_empty")]
    pub metadata: std::collections::HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishContractRequest {
    pub schema: serde_json::Value,
    pub version: String,
    pub compatibility_mode: Option<CompatibilityMode>,
    pub publisher_team_id: Uuid,
    #[serde(default)]
    pub force: bool,
    pub guarantees: Option<Guarantees>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompareRequest {
    pub proposed_schema: serde_json::Value,
    pub compatibility_mode: Option<CompatibilityMode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateRegistrationRequest {
    pub asset_id: Uuid,
    pub consumer_team_id: Uuid,
    pub pinned_version: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateRegistrationRequest {
    pub status: contractor_core::entities::RegistrationStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct AcknowledgeRequest {
    pub consumer_team_id: Uuid,
    pub response: contractor_core::entities::AckResponse,
    pub notes: Option<String>,
    pub migration_deadline: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WithdrawRequest {
    pub actor_id: Uuid,
    #[serde(default)]
    pub actor_is_admin: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActorRequest {
    pub actor_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateApiKeyRequest {
    pub team_id: Uuid,
    pub scope: ApiScope,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditQuery {
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub action: Option<String>,
    pub cursor: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: i64,
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeyCreatedResponse {
    pub id: Uuid,
    pub team_id: Uuid,
    pub scope: ApiScope,
    pub key: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeySummary {
    pub id: Uuid,
    pub team_id: Uuid,
    pub scope: ApiScope,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuditEventResponse {
    pub id: Uuid,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub action: String,
    pub actor_id: Uuid,
    pub payload: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuditPageResponse {
    pub events: Vec<AuditEventResponse>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompareResponse {
    pub changes: Vec<contractor_core::differ::Change>,
    pub severity: contractor_core::entities::ChangeType,
    pub breaking: Vec<contractor_core::differ::Change>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
    pub request_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    pub details: serde_json::Value,
}
