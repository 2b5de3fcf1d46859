//! Acknowledgment collection, resolution, withdraw, force-approve, and
//! publish-on-approval for a pending proposal.

use uuid::Uuid;

use crate::audit::{action, entity};
use crate::coordinator::PublishCoordinator;
use crate::entities::{
    AckResponse, Acknowledgment, ContractStatus, Proposal, ProposalStatus,
};
use crate::error::{CoreError, Result};
use crate::ports::{Clock, IdGenerator, NewAuditEvent, Tx};

pub struct ProposalLifecycle<'a> {
    pub clock: &'a dyn Clock,
    pub ids: &'a dyn IdGenerator,
}

impl<'a> ProposalLifecycle<'a> {
    pub fn new(clock: &'a dyn Clock, ids: &'a dyn IdGenerator) -> Self {
        Self { clock, ids }
    }

    /// Allowed only while `pending`. `consumer_team_id` must be in the
    /// proposal's snapshot set. Upserts by unique (proposal, consumer) —
    /// a consumer may change their mind until resolution.
    pub async fn acknowledge(
        &self,
        tx: &mut dyn Tx,
        proposal_id: Uuid,
        consumer_team_id: Uuid,
        response: AckResponse,
        notes: Option<String>,
        migration_deadline: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<Proposal> {
        let mut proposal = self.load_pending(tx, proposal_id).await?;

        if !proposal.snapshot_consumers.contains(&consumer_team_id) {
            return Err(CoreError::Forbidden(format!(
                "team {consumer_team_id} is not in the acknowledger set for proposal {proposal_id}"
            )));
        }

        let now = self.clock.now();
        let ack = Acknowledgment {
            id: self.ids.new_id(),
            proposal_id,
            consumer_team_id,
            response,
            migration_deadline,
            notes,
            responded_at: now,
        };
        tx.upsert_acknowledgment(&ack).await.map_err(CoreError::Internal)?;
        tx.append_audit(NewAuditEvent {
            entity_type: entity::ACKNOWLEDGMENT,
            entity_id: ack.id,
            action: action::PROPOSAL_ACKNOWLEDGED,
            actor_id: consumer_team_id,
            payload: serde_json::json!({ "proposal_id": proposal_id, "response": response }),
            occurred_at: now,
        })
        .await
        .map_err(CoreError::Internal)?;

        self.resolve(tx, &mut proposal).await?;
        Ok(proposal)
    }

    /// Recomputes resolution after every acknowledge: rejects on any block,
    /// approves once every snapshot member has approved or is migrating,
    /// otherwise leaves the proposal pending.
    async fn resolve(&self, tx: &mut dyn Tx, proposal: &mut Proposal) -> Result<()> {
        let acks = tx
            .list_acknowledgments(proposal.id)
            .await
            .map_err(CoreError::Internal)?;

        if acks.iter().any(|a| a.response == AckResponse::Blocked) {
            let now = self.clock.now();
            proposal.status = ProposalStatus::Rejected;
            proposal.resolved_at = Some(now);
            tx.update_proposal(proposal).await.map_err(CoreError::Internal)?;
            tx.append_audit(NewAuditEvent {
                entity_type: entity::PROPOSAL,
                entity_id: proposal.id,
                action: action::PROPOSAL_REJECTED,
                actor_id: proposal.proposed_by,
                payload: serde_json::json!({ "reason": "consumer blocked" }),
                occurred_at: now,
            })
            .await
            .map_err(CoreError::Internal)?;
            return Ok(());
        }

        let all_responded = proposal.snapshot_consumers.iter().all(|team| {
            acks.iter().any(|a| {
                a.consumer_team_id == *team
                    && matches!(a.response, AckResponse::Approved | AckResponse::Migrating)
            })
        });

        if all_responded {
            let now = self.clock.now();
            proposal.status = ProposalStatus::Approved;
            tx.update_proposal(proposal).await.map_err(CoreError::Internal)?;
            tx.append_audit(NewAuditEvent {
                entity_type: entity::PROPOSAL,
                entity_id: proposal.id,
                action: action::PROPOSAL_APPROVED,
                actor_id: proposal.proposed_by,
                payload: serde_json::json!({}),
                occurred_at: now,
            })
            .await
            .map_err(CoreError::Internal)?;
        }

        Ok(())
    }

    /// Only the proposing team or an admin may withdraw, only from `pending`.
    pub async fn withdraw(
        &self,
        tx: &mut dyn Tx,
        proposal_id: Uuid,
        actor_id: Uuid,
        actor_is_admin: bool,
    ) -> Result<Proposal> {
        let mut proposal = self.load_pending(tx, proposal_id).await?;

        if proposal.proposed_by != actor_id && !actor_is_admin {
            return Err(CoreError::Forbidden(
                "only the proposing team or an admin may withdraw this proposal".to_string(),
            ));
        }

        let now = self.clock.now();
        proposal.status = ProposalStatus::Withdrawn;
        proposal.resolved_at = Some(now);
        tx.update_proposal(&proposal).await.map_err(CoreError::Internal)?;
        tx.append_audit(NewAuditEvent {
            entity_type: entity::PROPOSAL,
            entity_id: proposal.id,
            action: action::PROPOSAL_WITHDRAWN,
            actor_id,
            payload: serde_json::json!({}),
            occurred_at: now,
        })
        .await
        .map_err(CoreError::Internal)?;
        Ok(proposal)
    }

    /// Admin-only: treats every outstanding acknowledgment as approved.
    pub async fn force(&self, tx: &mut dyn Tx, proposal_id: Uuid, actor_id: Uuid) -> Result<Proposal> {
        let mut proposal = self.load_pending(tx, proposal_id).await?;
        let acks = tx
            .list_acknowledgments(proposal_id)
            .await
            .map_err(CoreError::Internal)?;
        let unresolved: Vec<Uuid> = proposal
            .snapshot_consumers
            .iter()
            .copied()
            .filter(|team| !acks.iter().any(|a| a.consumer_team_id == *team))
            .collect();

        let now = self.clock.now();
        proposal.status = ProposalStatus::Approved;
        tx.update_proposal(&proposal).await.map_err(CoreError::Internal)?;
        tx.append_audit(NewAuditEvent {
            entity_type: entity::PROPOSAL,
            entity_id: proposal.id,
            action: action::PROPOSAL_FORCE_APPROVED,
            actor_id,
            payload: serde_json::json!({ "unresolved_acknowledgers": unresolved }),
            occurred_at: now,
        })
        .await
        .map_err(CoreError::Internal)?;
        Ok(proposal)
    }

    /// Allowed only from `approved`. Re-verifies the base contract is still
    /// current before performing the insert/deprecate transaction.
    pub async fn publish(
        &self,
        tx: &mut dyn Tx,
        coordinator: &PublishCoordinator<'_>,
        proposal_id: Uuid,
        actor_id: Uuid,
    ) -> Result<Proposal> {
        let mut proposal = tx
            .get_proposal(proposal_id)
            .await
            .map_err(CoreError::Internal)?
            .ok_or_else(|| CoreError::NotFound(format!("proposal {proposal_id}")))?;

        if proposal.status != ProposalStatus::Approved {
            return Err(CoreError::Conflict(format!(
                "proposal {proposal_id} is not approved"
            )));
        }

        let asset = tx
            .get_asset(proposal.asset_id)
            .await
            .map_err(CoreError::Internal)?
            .ok_or_else(|| CoreError::NotFound(format!("asset {}", proposal.asset_id)))?;

        tx.lock_asset(asset.id).await.map_err(CoreError::Internal)?;

        let still_current = asset.current_contract_id == Some(proposal.base_contract_id);
        if !still_current {
            let now = self.clock.now();
            proposal.status = ProposalStatus::Rejected;
            proposal.resolved_at = Some(now);
            tx.update_proposal(&proposal).await.map_err(CoreError::Internal)?;
            tx.append_audit(NewAuditEvent {
                entity_type: entity::PROPOSAL,
                entity_id: proposal.id,
                action: action::PROPOSAL_REJECTED,
                actor_id,
                payload: serde_json::json!({ "reason": "stale base contract" }),
                occurred_at: now,
            })
            .await
            .map_err(CoreError::Internal)?;
            return Err(CoreError::ConflictPersisted(format!(
                "base contract {} is no longer current on asset {}",
                proposal.base_contract_id, proposal.asset_id
            )));
        }

        let current = tx
            .get_contract(proposal.base_contract_id)
            .await
            .map_err(CoreError::Internal)?
            .ok_or_else(|| CoreError::NotFound(format!("contract {}", proposal.base_contract_id)))?;

        let now = self.clock.now();
        let contract = crate::entities::Contract {
            id: self.ids.new_id(),
            asset_id: proposal.asset_id,
            version: proposal.proposed_version.clone(),
            schema: proposal.proposed_schema.clone(),
            compatibility_mode: proposal.proposed_compatibility_mode,
            guarantees: None,
            status: ContractStatus::Active,
            published_at: now,
            published_by: actor_id,
        };
        tx.insert_contract(&contract).await.map_err(CoreError::Internal)?;
        tx.deprecate_contract(current.id).await.map_err(CoreError::Internal)?;
        tx.set_current_contract(proposal.asset_id, Some(contract.id))
            .await
            .map_err(CoreError::Internal)?;

        proposal.status = ProposalStatus::Published;
        proposal.resolved_at = Some(now);
        tx.update_proposal(&proposal).await.map_err(CoreError::Internal)?;

        tx.append_audit(NewAuditEvent {
            entity_type: entity::CONTRACT,
            entity_id: contract.id,
            action: action::CONTRACT_PUBLISHED,
            actor_id,
            payload: serde_json::json!({ "version": contract.version.to_string(), "from_proposal": proposal.id }),
            occurred_at: now,
        })
        .await
        .map_err(CoreError::Internal)?;
        tx.append_audit(NewAuditEvent {
            entity_type: entity::PROPOSAL,
            entity_id: proposal.id,
            action: action::PROPOSAL_PUBLISHED,
            actor_id,
            payload: serde_json::json!({}),
            occurred_at: now,
        })
        .await
        .map_err(CoreError::Internal)?;

        Ok(proposal)
    }

    async fn load_pending(&self, tx: &mut dyn Tx, proposal_id: Uuid) -> Result<Proposal> {
        let proposal = tx
            .get_proposal(proposal_id)
            .await
            .map_err(CoreError::Internal)?
            .ok_or_else(|| CoreError::NotFound(format!("proposal {proposal_id}")))?;
        if proposal.status != ProposalStatus::Pending {
            return Err(CoreError::Conflict(format!(
                "proposal {proposal_id} is not pending"
            )));
        }
        Ok(proposal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Asset, CompatibilityMode, Contract, ResourceType};
    use crate::testing::{FakeClock, FakeIdGenerator, FakeTx, RecordingNotifier};
    use chrono::Utc;
    use semver::Version;
    use serde_json::json;
    use std::collections::HashMap;

    fn asset(id: Uuid, current_contract_id: Option<Uuid>) -> Asset {
        Asset {
            id,
            fqn: "warehouse.orders".into(),
            owner_team_id: Uuid::new_v4(),
            resource_type: ResourceType::Table,
            current_contract_id,
            metadata: HashMap::new(),
            deleted_at: None,
        }
    }

    fn base_proposal(asset_id: Uuid, base_contract_id: Uuid, consumers: Vec<Uuid>) -> Proposal {
        Proposal {
            id: Uuid::new_v4(),
            asset_id,
            base_contract_id,
            proposed_schema: json!({ "type": "object", "properties": { "id": {"type": "string"} } }),
            proposed_version: Version::parse("2.0.0").unwrap(),
            proposed_compatibility_mode: CompatibilityMode::Backward,
            breaking_changes: Vec::new(),
            change_type: crate::entities::ChangeType::Major,
            status: ProposalStatus::Pending,
            snapshot_consumers: consumers,
            proposed_by: Uuid::new_v4(),
            proposed_at: Utc::now(),
            resolved_at: None,
        }
    }

    #[tokio::test]
    async fn one_blocked_acknowledgment_rejects_the_proposal() {
        let mut tx = FakeTx::new();
        let asset_id = Uuid::new_v4();
        let contract_id = Uuid::new_v4();
        tx.seed_asset(asset(asset_id, Some(contract_id)));
        let c1 = Uuid::new_v4();
        let c2 = Uuid::new_v4();
        let proposal = base_proposal(asset_id, contract_id, vec![c1, c2]);
        let proposal_id = proposal.id;
        tx.seed_proposal(proposal);

        let clock = FakeClock::new(Utc::now());
        let ids = FakeIdGenerator::new();
        let lifecycle = ProposalLifecycle::new(&clock, &ids);

        lifecycle
            .acknowledge(&mut tx, proposal_id, c1, AckResponse::Approved, None, None)
            .await
            .unwrap();
        let resolved = lifecycle
            .acknowledge(&mut tx, proposal_id, c2, AckResponse::Blocked, None, None)
            .await
            .unwrap();

        assert_eq!(resolved.status, ProposalStatus::Rejected);
    }

    #[tokio::test]
    async fn all_approved_then_explicit_publish() {
        let mut tx = FakeTx::new();
        let asset_id = Uuid::new_v4();
        let contract_id = Uuid::new_v4();
        tx.seed_asset(asset(asset_id, Some(contract_id)));
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
        let c1 = Uuid::new_v4();
        let c2 = Uuid::new_v4();
        let proposal = base_proposal(asset_id, contract_id, vec![c1, c2]);
        let proposal_id = proposal.id;
        tx.seed_proposal(proposal);

        let clock = FakeClock::new(Utc::now());
        let ids = FakeIdGenerator::new();
        let lifecycle = ProposalLifecycle::new(&clock, &ids);

        lifecycle
            .acknowledge(&mut tx, proposal_id, c1, AckResponse::Approved, None, None)
            .await
            .unwrap();
        let resolved = lifecycle
            .acknowledge(&mut tx, proposal_id, c2, AckResponse::Migrating, None, None)
            .await
            .unwrap();
        assert_eq!(resolved.status, ProposalStatus::Approved);

        let notifier = RecordingNotifier::new();
        let coordinator = PublishCoordinator::new(&clock, &ids, &notifier);
        let published = lifecycle
            .publish(&mut tx, &coordinator, proposal_id, Uuid::new_v4())
            .await
            .unwrap();

        assert_eq!(published.status, ProposalStatus::Published);
        let asset_after = tx.get_asset(asset_id).await.unwrap().unwrap();
        assert_ne!(asset_after.current_contract_id, Some(contract_id));
    }

    #[tokio::test]
    async fn publish_on_stale_base_contract_rejects() {
        let mut tx = FakeTx::new();
        let asset_id = Uuid::new_v4();
        let contract_id = Uuid::new_v4();
        let other_contract_id = Uuid::new_v4();
        // asset has already advanced past the proposal's base contract.
        tx.seed_asset(asset(asset_id, Some(other_contract_id)));
        let proposal = crate::entities::Proposal {
            status: ProposalStatus::Approved,
            ..base_proposal(asset_id, contract_id, vec![])
        };
        let proposal_id = proposal.id;
        tx.seed_proposal(proposal);

        let clock = FakeClock::new(Utc::now());
        let ids = FakeIdGenerator::new();
        let lifecycle = ProposalLifecycle::new(&clock, &ids);
        let notifier = RecordingNotifier::new();
        let coordinator = PublishCoordinator::new(&clock, &ids, &notifier);

        let err = lifecycle
            .publish(&mut tx, &coordinator, proposal_id, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ConflictPersisted(_)));

        let reloaded = tx.get_proposal(proposal_id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, ProposalStatus::Rejected);
    }

    #[tokio::test]
    async fn withdraw_requires_proposer_or_admin() {
        let mut tx = FakeTx::new();
        let asset_id = Uuid::new_v4();
        let contract_id = Uuid::new_v4();
        tx.seed_asset(asset(asset_id, Some(contract_id)));
        let proposal = base_proposal(asset_id, contract_id, vec![]);
        let proposer = proposal.proposed_by;
        let proposal_id = proposal.id;
        tx.seed_proposal(proposal);

        let clock = FakeClock::new(Utc::now());
        let ids = FakeIdGenerator::new();
        let lifecycle = ProposalLifecycle::new(&clock, &ids);

        let err = lifecycle
            .withdraw(&mut tx, proposal_id, Uuid::new_v4(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));

        let withdrawn = lifecycle
            .withdraw(&mut tx, proposal_id, proposer, false)
            .await
            .unwrap();
        assert_eq!(withdrawn.status, ProposalStatus::Withdrawn);
    }

    #[tokio::test]
    async fn force_approves_with_unresolved_acknowledgers() {
        let mut tx = FakeTx::new();
        let asset_id = Uuid::new_v4();
        let contract_id = Uuid::new_v4();
        tx.seed_asset(asset(asset_id, Some(contract_id)));
        let c1 = Uuid::new_v4();
        let proposal = base_proposal(asset_id, contract_id, vec![c1]);
        let proposal_id = proposal.id;
        tx.seed_proposal(proposal);

        let clock = FakeClock::new(Utc::now());
        let ids = FakeIdGenerator::new();
        let lifecycle = ProposalLifecycle::new(&clock, &ids);

        let forced = lifecycle
            .force(&mut tx, proposal_id, Uuid::new_v4())
            .await
            .unwrap();
        assert_eq!(forced.status, ProposalStatus::Approved);
        let log = tx.audit_log();
        assert!(log.iter().any(|e| e.action == action::PROPOSAL_FORCE_APPROVED));
    }
}
