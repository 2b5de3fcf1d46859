//! The write-path state machine: decides whether a publish request
//! auto-publishes, opens a proposal, or is rejected outright.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::{action, entity};
use crate::classifier::classify;
use crate::differ::{diff, Change};
use crate::entities::{
    ChangeType, CompatibilityMode, Contract, ContractStatus, Guarantees, Proposal, ProposalStatus,
    RegistrationStatus,
};
use crate::error::{CoreError, Result};
use crate::ports::{Clock, IdGenerator, NewAuditEvent, Notifier, Tx};
use crate::schema::SchemaNode;

/// A publish request as received at the core boundary. `force` bypasses
/// proposal creation for a `major` change and must already have been
/// authorised (admin scope) by the caller.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub asset_id: Uuid,
    pub proposed_schema: serde_json::Value,
    pub proposed_version: semver::Version,
    pub compatibility_mode: Option<CompatibilityMode>,
    pub publisher_team_id: Uuid,
    pub force: bool,
    pub guarantees: Option<Guarantees>,
}

/// The outcome of a publish call: either a new active contract, or a
/// proposal opened pending acknowledgment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PublishOutcome {
    Published(Contract),
    ProposalOpened(Proposal),
}

pub struct PublishCoordinator<'a> {
    pub clock: &'a dyn Clock,
    pub ids: &'a dyn IdGenerator,
    pub notifier: &'a dyn Notifier,
}

impl<'a> PublishCoordinator<'a> {
    pub fn new(clock: &'a dyn Clock, ids: &'a dyn IdGenerator, notifier: &'a dyn Notifier) -> Self {
        Self {
            clock,
            ids,
            notifier,
        }
    }

    /// Runs the full publish algorithm inside the transaction `tx` already
    /// has open. The caller is responsible for committing or rolling back.
    pub async fn publish(&self, tx: &mut dyn Tx, req: PublishRequest) -> Result<PublishOutcome> {
        let asset = tx
            .get_asset(req.asset_id)
            .await
            .map_err(CoreError::Internal)?
            .filter(|a| !a.is_deleted())
            .ok_or_else(|| CoreError::NotFound(format!("asset {}", req.asset_id)))?;

        tx.lock_asset(asset.id).await.map_err(CoreError::Internal)?;

        if tx
            .get_pending_proposal(asset.id)
            .await
            .map_err(CoreError::Internal)?
            .is_some()
        {
            return Err(CoreError::Conflict(format!(
                "asset {} already has a pending proposal",
                asset.id
            )));
        }

        let current = tx
            .get_active_contract(asset.id)
            .await
            .map_err(CoreError::Internal)?;

        if let Some(current) = &current {
            if req.proposed_version <= current.version {
                return Err(CoreError::Validation(format!(
                    "proposed version {} must be strictly greater than current version {}",
                    req.proposed_version, current.version
                )));
            }
        }

        let mode = req
            .compatibility_mode
            .or_else(|| current.as_ref().map(|c| c.compatibility_mode))
            .unwrap_or_default();

        let Some(current) = current else {
            let contract = self
                .insert_initial_contract(tx, &req, mode)
                .await?;
            return Ok(PublishOutcome::Published(contract));
        };

        let old_node = SchemaNode::parse_root(&current.schema)
            .map_err(|e| CoreError::BrokenContract(e.to_string()))?;
        let new_node = SchemaNode::parse_root(&req.proposed_schema)
            .map_err(|e| CoreError::BrokenContract(e.to_string()))?;
        let changes = diff(&old_node, &new_node);
        let classification = classify(&changes, mode);
        let change_type: ChangeType = classification.severity.into();

        if change_type != ChangeType::Major || req.force {
            let contract = self
                .replace_contract(tx, &req, &current, mode, change_type, req.force, &classification.breaking)
                .await?;
            return Ok(PublishOutcome::Published(contract));
        }

        let proposal = self
            .open_proposal(tx, &req, &current, mode, change_type, changes)
            .await?;
        Ok(PublishOutcome::ProposalOpened(proposal))
    }

    async fn insert_initial_contract(
        &self,
        tx: &mut dyn Tx,
        req: &PublishRequest,
        mode: CompatibilityMode,
    ) -> Result<Contract> {
        let now = self.clock.now();
        let contract = Contract {
            id: self.ids.new_id(),
            asset_id: req.asset_id,
            version: req.proposed_version.clone(),
            schema: req.proposed_schema.clone(),
            compatibility_mode: mode,
            guarantees: req.guarantees.clone(),
            status: ContractStatus::Active,
            published_at: now,
            published_by: req.publisher_team_id,
        };
        tx.insert_contract(&contract).await.map_err(CoreError::Internal)?;
        tx.set_current_contract(req.asset_id, Some(contract.id))
            .await
            .map_err(CoreError::Internal)?;
        tx.append_audit(NewAuditEvent {
            entity_type: entity::CONTRACT,
            entity_id: contract.id,
            action: action::CONTRACT_PUBLISHED,
            actor_id: req.publisher_team_id,
            payload: serde_json::json!({ "version": contract.version.to_string(), "change_type": "major", "initial": true }),
            occurred_at: now,
        })
        .await
        .map_err(CoreError::Internal)?;
        Ok(contract)
    }

    /// Activates a new contract and deprecates `current` in one transaction.
    /// Used both for a non-major publish and for a forced major publish.
    async fn replace_contract(
        &self,
        tx: &mut dyn Tx,
        req: &PublishRequest,
        current: &Contract,
        mode: CompatibilityMode,
        change_type: ChangeType,
        forced: bool,
        breaking: &[Change],
    ) -> Result<Contract> {
        let now = self.clock.now();
        let contract = Contract {
            id: self.ids.new_id(),
            asset_id: req.asset_id,
            version: req.proposed_version.clone(),
            schema: req.proposed_schema.clone(),
            compatibility_mode: mode,
            guarantees: req.guarantees.clone(),
            status: ContractStatus::Active,
            published_at: now,
            published_by: req.publisher_team_id,
        };
        tx.insert_contract(&contract).await.map_err(CoreError::Internal)?;
        tx.deprecate_contract(current.id).await.map_err(CoreError::Internal)?;
        tx.set_current_contract(req.asset_id, Some(contract.id))
            .await
            .map_err(CoreError::Internal)?;

        let publish_action = if forced {
            action::CONTRACT_FORCE_PUBLISHED
        } else {
            action::CONTRACT_PUBLISHED
        };
        tx.append_audit(NewAuditEvent {
            entity_type: entity::CONTRACT,
            entity_id: contract.id,
            action: publish_action,
            actor_id: req.publisher_team_id,
            payload: serde_json::json!({
                "version": contract.version.to_string(),
                "change_type": change_type,
                "breaking_changes": breaking,
            }),
            occurred_at: now,
        })
        .await
        .map_err(CoreError::Internal)?;
        tx.append_audit(NewAuditEvent {
            entity_type: entity::CONTRACT,
            entity_id: current.id,
            action: action::CONTRACT_DEPRECATED,
            actor_id: req.publisher_team_id,
            payload: serde_json::json!({ "superseded_by": contract.id }),
            occurred_at: now,
        })
        .await
        .map_err(CoreError::Internal)?;

        Ok(contract)
    }

    async fn open_proposal(
        &self,
        tx: &mut dyn Tx,
        req: &PublishRequest,
        current: &Contract,
        mode: CompatibilityMode,
        change_type: ChangeType,
        changes: Vec<Change>,
    ) -> Result<Proposal> {
        let now = self.clock.now();
        let registrations = tx
            .list_active_registrations(req.asset_id)
            .await
            .map_err(CoreError::Internal)?;
        let snapshot_consumers: Vec<Uuid> = registrations
            .into_iter()
            .filter(|r| r.status == RegistrationStatus::Active)
            .map(|r| r.consumer_team_id)
            .collect();

        let classification = classify(&changes, mode);

        let proposal = Proposal {
            id: self.ids.new_id(),
            asset_id: req.asset_id,
            base_contract_id: current.id,
            proposed_schema: req.proposed_schema.clone(),
            proposed_version: req.proposed_version.clone(),
            proposed_compatibility_mode: mode,
            breaking_changes: classification.breaking,
            change_type,
            status: ProposalStatus::Pending,
            snapshot_consumers: snapshot_consumers.clone(),
            proposed_by: req.publisher_team_id,
            proposed_at: now,
            resolved_at: None,
        };
        tx.insert_proposal(&proposal).await.map_err(CoreError::Internal)?;
        tx.append_audit(NewAuditEvent {
            entity_type: entity::PROPOSAL,
            entity_id: proposal.id,
            action: action::PROPOSAL_OPENED,
            actor_id: req.publisher_team_id,
            payload: serde_json::json!({ "snapshot_consumers": snapshot_consumers }),
            occurred_at: now,
        })
        .await
        .map_err(CoreError::Internal)?;

        self.notifier
            .notify_proposal_opened(&proposal, &snapshot_consumers)
            .await;

        Ok(proposal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Asset, ResourceType};
    use crate::testing::{FakeClock, FakeIdGenerator, FakeTx, RecordingNotifier};
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

    fn coordinator() -> (FakeClock, FakeIdGenerator, RecordingNotifier) {
        (
            FakeClock::new(Utc::now()),
            FakeIdGenerator::new(),
            RecordingNotifier::new(),
        )
    }

    #[tokio::test]
    async fn first_publish_activates_contract() {
        let mut tx = FakeTx::new();
        let asset_id = Uuid::new_v4();
        tx.seed_asset(asset(asset_id));
        let (clock, ids, notifier) = coordinator();
        let coordinator = PublishCoordinator::new(&clock, &ids, &notifier);

        let outcome = coordinator
            .publish(
                &mut tx,
                PublishRequest {
                    asset_id,
                    proposed_schema: json!({
                        "type": "object",
                        "properties": { "id": { "type": "integer" } },
                        "required": ["id"]
                    }),
                    proposed_version: Version::parse("1.0.0").unwrap(),
                    compatibility_mode: None,
                    publisher_team_id: Uuid::new_v4(),
                    force: false,
                    guarantees: None,
                },
            )
            .await
            .unwrap();

        match outcome {
            PublishOutcome::Published(contract) => {
                assert_eq!(contract.status, ContractStatus::Active);
            }
            PublishOutcome::ProposalOpened(_) => panic!("expected an immediate publish"),
        }
        assert_eq!(tx.audit_log().len(), 1);
    }

    #[tokio::test]
    async fn breaking_change_opens_proposal_and_notifies_snapshot() {
        let mut tx = FakeTx::new();
        let asset_id = Uuid::new_v4();
        tx.seed_asset(asset(asset_id));
        let contract_id = Uuid::new_v4();
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

        let (clock, ids, notifier) = coordinator();
        let coordinator = PublishCoordinator::new(&clock, &ids, &notifier);

        let outcome = coordinator
            .publish(
                &mut tx,
                PublishRequest {
                    asset_id,
                    proposed_schema: json!({ "type": "object", "properties": { "id": {"type": "string"} } }),
                    proposed_version: Version::parse("2.0.0").unwrap(),
                    compatibility_mode: None,
                    publisher_team_id: Uuid::new_v4(),
                    force: false,
                    guarantees: None,
                },
            )
            .await
            .unwrap();

        let proposal = match outcome {
            PublishOutcome::ProposalOpened(p) => p,
            PublishOutcome::Published(_) => panic!("expected a blocked proposal"),
        };
        assert_eq!(proposal.status, ProposalStatus::Pending);
        assert_eq!(proposal.snapshot_consumers, vec![consumer]);
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn pending_proposal_blocks_further_publishes() {
        let mut tx = FakeTx::new();
        let asset_id = Uuid::new_v4();
        tx.seed_asset(asset(asset_id));
        tx.seed_proposal(Proposal {
            id: Uuid::new_v4(),
            asset_id,
            base_contract_id: Uuid::new_v4(),
            proposed_schema: json!({}),
            proposed_version: Version::parse("1.0.0").unwrap(),
            proposed_compatibility_mode: CompatibilityMode::Backward,
            breaking_changes: Vec::new(),
            change_type: ChangeType::Major,
            status: ProposalStatus::Pending,
            snapshot_consumers: Vec::new(),
            proposed_by: Uuid::new_v4(),
            proposed_at: Utc::now(),
            resolved_at: None,
        });

        let (clock, ids, notifier) = coordinator();
        let coordinator = PublishCoordinator::new(&clock, &ids, &notifier);
        let err = coordinator
            .publish(
                &mut tx,
                PublishRequest {
                    asset_id,
                    proposed_schema: json!({ "type": "object" }),
                    proposed_version: Version::parse("1.1.0").unwrap(),
                    compatibility_mode: None,
                    publisher_team_id: Uuid::new_v4(),
                    force: false,
                    guarantees: None,
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn version_must_strictly_increase() {
        let mut tx = FakeTx::new();
        let asset_id = Uuid::new_v4();
        tx.seed_asset(asset(asset_id));
        tx.seed_contract(Contract {
            id: Uuid::new_v4(),
            asset_id,
            version: Version::parse("1.0.0").unwrap(),
            schema: json!({ "type": "object" }),
            compatibility_mode: CompatibilityMode::Backward,
            guarantees: None,
            status: ContractStatus::Active,
            published_at: Utc::now(),
            published_by: Uuid::new_v4(),
        });

        let (clock, ids, notifier) = coordinator();
        let coordinator = PublishCoordinator::new(&clock, &ids, &notifier);
        let err = coordinator
            .publish(
                &mut tx,
                PublishRequest {
                    asset_id,
                    proposed_schema: json!({ "type": "object" }),
                    proposed_version: Version::parse("1.0.0").unwrap(),
                    compatibility_mode: None,
                    publisher_team_id: Uuid::new_v4(),
                    force: false,
                    guarantees: None,
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn force_publishes_major_change_directly() {
        let mut tx = FakeTx::new();
        let asset_id = Uuid::new_v4();
        tx.seed_asset(asset(asset_id));
        let contract_id = Uuid::new_v4();
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

        let (clock, ids, notifier) = coordinator();
        let coordinator = PublishCoordinator::new(&clock, &ids, &notifier);
        let outcome = coordinator
            .publish(
                &mut tx,
                PublishRequest {
                    asset_id,
                    proposed_schema: json!({ "type": "object", "properties": { "id": {"type": "string"} } }),
                    proposed_version: Version::parse("2.0.0").unwrap(),
                    compatibility_mode: None,
                    publisher_team_id: Uuid::new_v4(),
                    force: true,
                    guarantees: None,
                },
            )
            .await
            .unwrap();

        match outcome {
            PublishOutcome::Published(contract) => assert_eq!(contract.status, ContractStatus::Active),
            PublishOutcome::ProposalOpened(_) => panic!("force should bypass the proposal"),
        }
        let log = tx.audit_log();
        assert!(log.iter().any(|e| e.action == action::CONTRACT_FORCE_PUBLISHED));
    }
}
