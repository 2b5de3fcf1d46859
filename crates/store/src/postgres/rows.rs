//! Row <-> domain entity conversions. Kept separate from the `Tx` impl so
//! the query bodies in `mod.rs` stay readable.

use std::collections::HashMap;

use contractor_core::differ::Change;
use contractor_core::entities::{
    Acknowledgment, AckResponse, ApiScope, Asset, ChangeType, CompatibilityMode, Contract,
    ContractStatus, Guarantees, Proposal, ProposalStatus, Registration, RegistrationStatus,
    ResourceType,
};
use semver::Version;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

pub fn asset_from_row(row: &PgRow) -> anyhow::Result<Asset> {
    let metadata: serde_json::Value = row.try_get("metadata")?;
    Ok(Asset {
        id: row.try_get("id")?,
        fqn: row.try_get("fqn")?,
        owner_team_id: row.try_get("owner_team_id")?,
        resource_type: parse_resource_type(row.try_get("resource_type")?)?,
        current_contract_id: row.try_get("current_contract_id")?,
        metadata: metadata_to_map(metadata),
        deleted_at: row.try_get("deleted_at")?,
    })
}

pub fn contract_from_row(row: &PgRow) -> anyhow::Result<Contract> {
    let version: String = row.try_get("version")?;
    let guarantees: Option<serde_json::Value> = row.try_get("guarantees")?;
    Ok(Contract {
        id: row.try_get("id")?,
        asset_id: row.try_get("asset_id")?,
        version: Version::parse(&version)?,
        schema: row.try_get("schema")?,
        compatibility_mode: parse_compatibility_mode(row.try_get("compatibility_mode")?)?,
        guarantees: guarantees.map(serde_json::from_value).transpose()?,
        status: parse_contract_status(row.try_get("status")?)?,
        published_at: row.try_get("published_at")?,
        published_by: row.try_get("published_by")?,
    })
}

pub fn proposal_from_row(row: &PgRow) -> anyhow::Result<Proposal> {
    let proposed_version: String = row.try_get("proposed_version")?;
    let breaking_changes: serde_json::Value = row.try_get("breaking_changes")?;
    let snapshot_consumers: Vec<Uuid> = row.try_get("snapshot_consumers")?;
    Ok(Proposal {
        id: row.try_get("id")?,
        asset_id: row.try_get("asset_id")?,
        base_contract_id: row.try_get("base_contract_id")?,
        proposed_schema: row.try_get("proposed_schema")?,
        proposed_version: Version::parse(&proposed_version)?,
        proposed_compatibility_mode: parse_compatibility_mode(
            row.try_get("proposed_compatibility_mode")?,
        )?,
        breaking_changes: serde_json::from_value(breaking_changes)?,
        change_type: parse_change_type(row.try_get("change_type")?)?,
        status: parse_proposal_status(row.try_get("status")?)?,
        snapshot_consumers,
        proposed_by: row.try_get("proposed_by")?,
        proposed_at: row.try_get("proposed_at")?,
        resolved_at: row.try_get("resolved_at")?,
    })
}

pub fn acknowledgment_from_row(row: &PgRow) -> anyhow::Result<Acknowledgment> {
    Ok(Acknowledgment {
        id: row.try_get("id")?,
        proposal_id: row.try_get("proposal_id")?,
        consumer_team_id: row.try_get("consumer_team_id")?,
        response: parse_ack_response(row.try_get("response")?)?,
        migration_deadline: row.try_get("migration_deadline")?,
        notes: row.try_get("notes")?,
        responded_at: row.try_get("responded_at")?,
    })
}

pub fn registration_from_row(row: &PgRow) -> anyhow::Result<Registration> {
    let pinned_version: Option<String> = row.try_get("pinned_version")?;
    Ok(Registration {
        id: row.try_get("id")?,
        asset_id: row.try_get("asset_id")?,
        consumer_team_id: row.try_get("consumer_team_id")?,
        pinned_version: pinned_version.map(|v| Version::parse(&v)).transpose()?,
        status: parse_registration_status(row.try_get("status")?)?,
        registered_at: row.try_get("registered_at")?,
    })
}

fn metadata_to_map(value: serde_json::Value) -> HashMap<String, serde_json::Value> {
    match value {
        serde_json::Value::Object(map) => map.into_iter().collect(),
        _ => HashMap::new(),
    }
}

fn parse_resource_type(s: String) -> anyhow::Result<ResourceType> {
    Ok(match s.as_str() {
        "table" => ResourceType::Table,
        "view" => ResourceType::View,
        "model" => ResourceType::Model,
        "api_endpoint" => ResourceType::ApiEndpoint,
        "graphql_query" => ResourceType::GraphqlQuery,
        other => anyhow::bail!("unknown resource_type: {other}"),
    })
}

pub fn resource_type_str(r: ResourceType) -> &'static str {
    match r {
        ResourceType::Table => "table",
        ResourceType::View => "view",
        ResourceType::Model => "model",
        ResourceType::ApiEndpoint => "api_endpoint",
        ResourceType::GraphqlQuery => "graphql_query",
    }
}

fn parse_compatibility_mode(s: String) -> anyhow::Result<CompatibilityMode> {
    Ok(match s.as_str() {
        "backward" => CompatibilityMode::Backward,
        "forward" => CompatibilityMode::Forward,
        "full" => CompatibilityMode::Full,
        "none" => CompatibilityMode::None,
        other => anyhow::bail!("unknown compatibility_mode: {other}"),
    })
}

pub fn compatibility_mode_str(m: CompatibilityMode) -> &'static str {
    match m {
        CompatibilityMode::Backward => "backward",
        CompatibilityMode::Forward => "forward",
        CompatibilityMode::Full => "full",
        CompatibilityMode::None => "none",
    }
}

fn parse_contract_status(s: String) -> anyhow::Result<ContractStatus> {
    Ok(match s.as_str() {
        "active" => ContractStatus::Active,
        "deprecated" => ContractStatus::Deprecated,
        "retired" => ContractStatus::Retired,
        other => anyhow::bail!("unknown contract status: {other}"),
    })
}

pub fn contract_status_str(s: ContractStatus) -> &'static str {
    match s {
        ContractStatus::Active => "active",
        ContractStatus::Deprecated => "deprecated",
        ContractStatus::Retired => "retired",
    }
}

fn parse_registration_status(s: String) -> anyhow::Result<RegistrationStatus> {
    Ok(match s.as_str() {
        "active" => RegistrationStatus::Active,
        "migrating" => RegistrationStatus::Migrating,
        "inactive" => RegistrationStatus::Inactive,
        other => anyhow::bail!("unknown registration status: {other}"),
    })
}

pub fn registration_status_str(s: RegistrationStatus) -> &'static str {
    match s {
        RegistrationStatus::Active => "active",
        RegistrationStatus::Migrating => "migrating",
        RegistrationStatus::Inactive => "inactive",
    }
}

fn parse_change_type(s: String) -> anyhow::Result<ChangeType> {
    Ok(match s.as_str() {
        "patch" => ChangeType::Patch,
        "minor" => ChangeType::Minor,
        "major" => ChangeType::Major,
        other => anyhow::bail!("unknown change_type: {other}"),
    })
}

pub fn change_type_str(c: ChangeType) -> &'static str {
    match c {
        ChangeType::Patch => "patch",
        ChangeType::Minor => "minor",
        ChangeType::Major => "major",
    }
}

fn parse_proposal_status(s: String) -> anyhow::Result<ProposalStatus> {
    Ok(match s.as_str() {
        "pending" => ProposalStatus::Pending,
        "approved" => ProposalStatus::Approved,
        "rejected" => ProposalStatus::Rejected,
        "withdrawn" => ProposalStatus::Withdrawn,
        "published" => ProposalStatus::Published,
        other => anyhow::bail!("unknown proposal status: {other}"),
    })
}

pub fn proposal_status_str(s: ProposalStatus) -> &'static str {
    match s {
        ProposalStatus::Pending => "pending",
        ProposalStatus::Approved => "approved",
        ProposalStatus::Rejected => "rejected",
        ProposalStatus::Withdrawn => "withdrawn",
        ProposalStatus::Published => "published",
    }
}

fn parse_ack_response(s: String) -> anyhow::Result<AckResponse> {
    Ok(match s.as_str() {
        "approved" => AckResponse::Approved,
        "blocked" => AckResponse::Blocked,
        "migrating" => AckResponse::Migrating,
        other => anyhow::bail!("unknown ack response: {other}"),
    })
}

pub fn ack_response_str(r: AckResponse) -> &'static str {
    match r {
        AckResponse::Approved => "approved",
        AckResponse::Blocked => "blocked",
        AckResponse::Migrating => "migrating",
    }
}

/// Serialises a change list the same way it is stored (`jsonb`).
pub fn breaking_changes_json(changes: &[Change]) -> anyhow::Result<serde_json::Value> {
    Ok(serde_json::to_value(changes)?)
}

pub fn api_scope_str(scope: ApiScope) -> &'static str {
    match scope {
        ApiScope::Read => "read",
        ApiScope::Write => "write",
        ApiScope::Admin => "admin",
    }
}

pub fn parse_api_scope(s: &str) -> anyhow::Result<ApiScope> {
    Ok(match s {
        "read" => ApiScope::Read,
        "write" => ApiScope::Write,
        "admin" => ApiScope::Admin,
        other => anyhow::bail!("unknown api scope: {other}"),
    })
}
