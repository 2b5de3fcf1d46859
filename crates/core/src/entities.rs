//! Domain entities shared by the coordination core.
//!
//! These are plain value types; persistence mapping lives in `contractor-store`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::differ::Change;

/// A team owns assets and acts as producer or consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Team {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// The kind of warehouse object an asset represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Table,
    View,
    Model,
    ApiEndpoint,
    GraphqlQuery,
}

/// A data object owned by a producer team.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub id: Uuid,
    pub fqn: String,
    pub owner_team_id: Uuid,
    pub resource_type: ResourceType,
    pub current_contract_id: Option<Uuid>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Asset {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// The compatibility rule set governing which diffs are breaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompatibilityMode {
    Backward,
    Forward,
    Full,
    None,
}

impl Default for CompatibilityMode {
    fn default() -> Self {
        CompatibilityMode::Backward
    }
}

/// Declarative data-quality metadata recorded but never enforced by the core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Guarantees {
    pub freshness: Option<String>,
    pub volume: Option<String>,
    pub nullability: Option<String>,
    pub accepted_values: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    Active,
    Deprecated,
    Retired,
}

/// A versioned schema plus guarantees published for an asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    pub id: Uuid,
    pub asset_id: Uuid,
    pub version: Version,
    pub schema: serde_json::Value,
    pub compatibility_mode: CompatibilityMode,
    pub guarantees: Option<Guarantees>,
    pub status: ContractStatus,
    pub published_at: DateTime<Utc>,
    pub published_by: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    Active,
    Migrating,
    Inactive,
}

/// A consumer's declared dependency on an asset (or a pinned contract version).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub id: Uuid,
    pub asset_id: Uuid,
    pub consumer_team_id: Uuid,
    pub pinned_version: Option<Version>,
    pub status: RegistrationStatus,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Patch,
    Minor,
    Major,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Pending,
    Approved,
    Rejected,
    Withdrawn,
    Published,
}

/// A producer's request to publish a breaking change, suspended pending
/// acknowledgment from every team in its snapshot set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub id: Uuid,
    pub asset_id: Uuid,
    pub base_contract_id: Uuid,
    pub proposed_schema: serde_json::Value,
    pub proposed_version: Version,
    pub proposed_compatibility_mode: CompatibilityMode,
    pub breaking_changes: Vec<Change>,
    pub change_type: ChangeType,
    pub status: ProposalStatus,
    /// Consumer teams captured at proposal-open time (invariant 6).
    pub snapshot_consumers: Vec<Uuid>,
    pub proposed_by: Uuid,
    pub proposed_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckResponse {
    Approved,
    Blocked,
    Migrating,
}

/// A consumer's response to a proposal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Acknowledgment {
    pub id: Uuid,
    pub proposal_id: Uuid,
    pub consumer_team_id: Uuid,
    pub response: AckResponse,
    pub migration_deadline: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub responded_at: DateTime<Utc>,
}

/// A directed lineage edge; acyclicity is not enforced on write.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AssetDependency {
    pub upstream_asset_id: Uuid,
    pub downstream_asset_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiScope {
    Read,
    Write,
    Admin,
}

impl ApiScope {
    /// True if this scope satisfies a request that requires `required`.
    pub fn satisfies(self, required: ApiScope) -> bool {
        let rank = |s: ApiScope| match s {
            ApiScope::Read => 0,
            ApiScope::Write => 1,
            ApiScope::Admin => 2,
        };
        rank(self) >= rank(required)
    }
}

/// A scoped API credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: Uuid,
    pub team_id: Uuid,
    pub scope: ApiScope,
    pub key_hash: String,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl ApiKey {
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }
}

/// A consumer team and its pinned version, as returned by impact analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerSnapshot {
    pub consumer_team_id: Uuid,
    pub pinned_version: Option<Version>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_scope_rank_order() {
        assert!(ApiScope::Admin.satisfies(ApiScope::Write));
        assert!(ApiScope::Write.satisfies(ApiScope::Read));
        assert!(!ApiScope::Read.satisfies(ApiScope::Write));
        assert!(ApiScope::Read.satisfies(ApiScope::Read));
    }

    #[test]
    fn team_soft_delete() {
        let mut team = Team {
            id: Uuid::new_v4(),
            name: "n".into(),
            slug: "n".into(),
            metadata: HashMap::new(),
            created_at: Utc::now(),
            deleted_at: None,
        };
        assert!(!team.is_deleted());
        team.deleted_at = Some(Utc::now());
        assert!(team.is_deleted());
    }
}
