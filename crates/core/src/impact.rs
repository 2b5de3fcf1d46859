//! Resolves affected consumers for a proposed schema against an asset's
//! current contract. A pure read: no writes, no side effects, no audit
//! event.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::classifier::classify;
use crate::differ::{diff, Change};
use crate::entities::{ChangeType, CompatibilityMode, ConsumerSnapshot, RegistrationStatus};
use crate::error::{CoreError, Result};
use crate::ports::Tx;
use crate::schema::SchemaNode;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactReport {
    pub change_type: ChangeType,
    pub breaking_changes: Vec<Change>,
    pub impacted_consumers: Vec<ConsumerSnapshot>,
    pub safe_to_publish: bool,
}

/// Diff `proposed_schema` against the asset's current active contract and
/// report the affected, active consumers.
pub async fn impact(
    tx: &mut dyn Tx,
    asset_id: Uuid,
    proposed_schema: &serde_json::Value,
    mode: CompatibilityMode,
) -> Result<ImpactReport> {
    let asset = tx
        .get_asset(asset_id)
        .await
        .map_err(CoreError::Internal)?
        .filter(|a| !a.is_deleted())
        .ok_or_else(|| CoreError::NotFound(format!("asset {asset_id}")))?;

    let current = tx
        .get_active_contract(asset.id)
        .await
        .map_err(CoreError::Internal)?;

    let Some(current) = current else {
        let is_empty = proposed_schema == &serde_json::json!({});
        return Ok(ImpactReport {
            change_type: if is_empty {
                ChangeType::Patch
            } else {
                ChangeType::Major
            },
            breaking_changes: Vec::new(),
            impacted_consumers: Vec::new(),
            safe_to_publish: true,
        });
    };

    let old_node =
        SchemaNode::parse_root(&current.schema).map_err(|e| CoreError::BrokenContract(e.to_string()))?;
    let new_node = SchemaNode::parse_root(proposed_schema)
        .map_err(|e| CoreError::BrokenContract(e.to_string()))?;

    let changes = diff(&old_node, &new_node);
    let classification = classify(&changes, mode);

    let registrations = tx
        .list_active_registrations(asset.id)
        .await
        .map_err(CoreError::Internal)?;

    let impacted_consumers = registrations
        .into_iter()
        .filter(|r| r.status == RegistrationStatus::Active)
        .map(|r| ConsumerSnapshot {
            consumer_team_id: r.consumer_team_id,
            pinned_version: r.pinned_version,
        })
        .collect();

    Ok(ImpactReport {
        change_type: classification.severity.into(),
        safe_to_publish: classification.breaking.is_empty(),
        breaking_changes: classification.breaking,
        impacted_consumers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTx;
    use crate::entities::{Asset, Contract, ContractStatus, ResourceType};
    use chrono::Utc;
    use semver::Version;
    use serde_json::json;
    use std::collections::HashMap;

    fn asset(id: Uuid) -> Asset {
        Asset {
            id,
            fqn: "warehouse.orders".into(),
            owner_team_id: Uuid::new_v4(),
            resource_type: ResourceType::Table,
            current_contract_id: None,
            metadata: HashMap::new(),
            deleted_at: None,
        }
    }

    #[tokio::test]
    async fn no_current_contract_is_always_safe() {
        let mut tx = FakeTx::new();
        let a = asset(Uuid::new_v4());
        tx.seed_asset(a.clone());

        let report = impact(
            &mut tx,
            a.id,
            &json!({ "type": "object" }),
            CompatibilityMode::Backward,
        )
        .await
        .unwrap();

        assert!(report.safe_to_publish);
        assert!(report.impacted_consumers.is_empty());
        assert_eq!(report.change_type, ChangeType::Major);
    }

    #[tokio::test]
    async fn breaking_change_reports_active_consumers() {
        let mut tx = FakeTx::new();
        let asset_id = Uuid::new_v4();
        let mut a = asset(asset_id);
        let contract_id = Uuid::new_v4();
        a.current_contract_id = Some(contract_id);
        tx.seed_asset(a.clone());
        tx.seed_contract(Contract {
            id: contract_id,
            asset_id,
            version: Version::parse("1.0.0").unwrap(),
            schema: json!({ "type": "object", "properties": { "id": {"type": "integer"} } }),
            compatibility_mode: CompatibilityMode::Backward,
            guarantees: None,
            status: ContractStatus::Active,
            published_at: Utc::now(),
            published_by: Uuid::new_v4(),
        });
        let consumer = Uuid::new_v4();
        tx.seed_active_registration(asset_id, consumer);

        let report = impact(
            &mut tx,
            asset_id,
            &json!({ "type": "object", "properties": { "id": {"type": "string"} } }),
            CompatibilityMode::Backward,
        )
        .await
        .unwrap();

        assert!(!report.safe_to_publish);
        assert_eq!(report.impacted_consumers.len(), 1);
        assert_eq!(report.impacted_consumers[0].consumer_team_id, consumer);
    }
}
