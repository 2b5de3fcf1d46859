//! Request bodies and query parameters accepted by the HTTP surface.

use contractor_core::entities::{ApiScope, CompatibilityMode, ResourceType};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateTeamRequest {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub metadata: std::collections::HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct CreateAssetRequest {
    pub fqn: String,
    pub owner_team_id: Uuid,
    pub resource_type: ResourceType,
    #[serde(default)]
    pub metadata: std::collections::HashMap<String, serde_json::Value>,
}

/// Body for `POST /api/v1/assets/:id/contracts`, the publish entry point.
#[derive(Debug, Deserialize)]
pub struct PublishContractRequest {
    pub schema: serde_json::Value,
    pub version: String,
    pub compatibility_mode: Option<CompatibilityMode>,
    pub publisher_team_id: Uuid,
    #[serde(default)]
    pub force: bool,
    pub guarantees: Option<contractor_core::entities::Guarantees>,
}

/// Body for `POST /api/v1/assets/:id/compare` — a pure read, no mutation.
#[derive(Debug, Deserialize)]
pub struct CompareRequest {
    pub proposed_schema: serde_json::Value,
    pub compatibility_mode: Option<CompatibilityMode>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRegistrationRequest {
    pub asset_id: Uuid,
    pub consumer_team_id: Uuid,
    pub pinned_version: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRegistrationRequest {
    pub status: contractor_core::entities::RegistrationStatus,
}

#[derive(Debug, Deserialize)]
pub struct AcknowledgeRequest {
    pub consumer_team_id: Uuid,
    pub response: contractor_core::entities::AckResponse,
    pub notes: Option<String>,
    pub migration_deadline: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    pub actor_id: Uuid,
    #[serde(default)]
    pub actor_is_admin: bool,
}

#[derive(Debug, Deserialize)]
pub struct ActorRequest {
    pub actor_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct CreateApiKeyRequest {
    pub team_id: Uuid,
    pub scope: ApiScope,
}

/// Query parameters for `GET /api/v1/audit`.
#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub action: Option<String>,
    pub cursor: Option<String>,
    #[serde(default = "default_audit_limit")]
    pub limit: i64,
}

fn default_audit_limit() -> i64 {
    100
}

#[derive(Debug, Deserialize)]
pub struct ListAssetsQuery {
    pub owner_team_id: Option<Uuid>,
}
