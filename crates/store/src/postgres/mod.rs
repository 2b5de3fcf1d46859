//! Postgres-backed implementation of `contractor_core::ports::{Store, Tx}`.
//!
//! Every method is a hand-written `sqlx::query`/`query_as` call (no
//! compile-time `query!` macros, so this crate builds without a live
//! database reachable at compile time).

pub mod rows;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use contractor_core::entities::{
    Acknowledgment, ApiKey, Asset, Contract, Proposal, Registration, RegistrationStatus, Team,
};
use contractor_core::ports::{NewAuditEvent, Store, Tx};
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use rows::*;

/// Implements [`Store`] by opening a new serialisable transaction per call.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn begin(&self) -> anyhow::Result<Box<dyn Tx>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("set transaction isolation level serializable")
            .execute(&mut *tx)
            .await?;
        Ok(Box::new(PgTx { tx: Some(tx) }))
    }
}

/// An open transaction. `tx` is `None` only after `commit`/`rollback` has
/// consumed it; every other method assumes it is present.
pub struct PgTx {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgTx {
    fn conn(&mut self) -> &mut Transaction<'static, Postgres> {
        self.tx.as_mut().expect("transaction already finalised")
    }
}

#[async_trait]
impl Tx for PgTx {
    async fn get_asset(&mut self, id: Uuid) -> anyhow::Result<Option<Asset>> {
        let row = sqlx::query("select * from core.assets where id = $1")
            .bind(id)
            .fetch_optional(self.conn())
            .await?;
        row.as_ref().map(asset_from_row).transpose()
    }

    async fn get_asset_by_fqn(&mut self, fqn: &str) -> anyhow::Result<Option<Asset>> {
        let row = sqlx::query("select * from core.assets where fqn = $1 and deleted_at is null")
            .bind(fqn)
            .fetch_optional(self.conn())
            .await?;
        row.as_ref().map(asset_from_row).transpose()
    }

    async fn lock_asset(&mut self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("select id from core.assets where id = $1 for update")
            .bind(id)
            .fetch_one(self.conn())
            .await?;
        Ok(())
    }

    async fn insert_asset(&mut self, asset: &Asset) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            insert into core.assets
                (id, fqn, owner_team_id, resource_type, current_contract_id, metadata, deleted_at)
            values ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(asset.id)
        .bind(&asset.fqn)
        .bind(asset.owner_team_id)
        .bind(resource_type_str(asset.resource_type))
        .bind(asset.current_contract_id)
        .bind(serde_json::to_value(&asset.metadata)?)
        .bind(asset.deleted_at)
        .execute(self.conn())
        .await?;
        Ok(())
    }

    async fn soft_delete_asset(&mut self, id: Uuid, at: DateTime<Utc>) -> anyhow::Result<()> {
        sqlx::query("update core.assets set deleted_at = $2 where id = $1")
            .bind(id)
            .bind(at)
            .execute(self.conn())
            .await?;
        Ok(())
    }

    async fn set_current_contract(
        &mut self,
        asset_id: Uuid,
        contract_id: Option<Uuid>,
    ) -> anyhow::Result<()> {
        sqlx::query("update core.assets set current_contract_id = $1 where id = $2")
            .bind(contract_id)
            .bind(asset_id)
            .execute(self.conn())
            .await?;
        Ok(())
    }

    async fn get_contract(&mut self, id: Uuid) -> anyhow::Result<Option<Contract>> {
        let row = sqlx::query("select * from core.contracts where id = $1")
            .bind(id)
            .fetch_optional(self.conn())
            .await?;
        row.as_ref().map(contract_from_row).transpose()
    }

    async fn get_active_contract(&mut self, asset_id: Uuid) -> anyhow::Result<Option<Contract>> {
        let row = sqlx::query(
            "select * from core.contracts where asset_id = $1 and status = 'active'",
        )
        .bind(asset_id)
        .fetch_optional(self.conn())
        .await?;
        row.as_ref().map(contract_from_row).transpose()
    }

    async fn insert_contract(&mut self, contract: &Contract) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            insert into core.contracts
                (id, asset_id, version, schema, compatibility_mode, guarantees, status, published_at, published_by)
            values ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(contract.id)
        .bind(contract.asset_id)
        .bind(contract.version.to_string())
        .bind(&contract.schema)
        .bind(compatibility_mode_str(contract.compatibility_mode))
        .bind(contract.guarantees.as_ref().map(serde_json::to_value).transpose()?)
        .bind(contract_status_str(contract.status))
        .bind(contract.published_at)
        .bind(contract.published_by)
        .execute(self.conn())
        .await?;
        Ok(())
    }

    async fn deprecate_contract(&mut self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("update core.contracts set status = 'deprecated' where id = $1")
            .bind(id)
            .execute(self.conn())
            .await?;
        Ok(())
    }

    async fn get_pending_proposal(&mut self, asset_id: Uuid) -> anyhow::Result<Option<Proposal>> {
        let row = sqlx::query(
            "select * from workflow.proposals where asset_id = $1 and status = 'pending'",
        )
        .bind(asset_id)
        .fetch_optional(self.conn())
        .await?;
        row.as_ref().map(proposal_from_row).transpose()
    }

    async fn get_proposal(&mut self, id: Uuid) -> anyhow::Result<Option<Proposal>> {
        let row = sqlx::query("select * from workflow.proposals where id = $1")
            .bind(id)
            .fetch_optional(self.conn())
            .await?;
        row.as_ref().map(proposal_from_row).transpose()
    }

    async fn insert_proposal(&mut self, proposal: &Proposal) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            insert into workflow.proposals
                (id, asset_id, base_contract_id, proposed_schema, proposed_version,
                 proposed_compatibility_mode, breaking_changes, change_type, status,
                 snapshot_consumers, proposed_by, proposed_at, resolved_at)
            values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(proposal.id)
        .bind(proposal.asset_id)
        .bind(proposal.base_contract_id)
        .bind(&proposal.proposed_schema)
        .bind(proposal.proposed_version.to_string())
        .bind(compatibility_mode_str(proposal.proposed_compatibility_mode))
        .bind(breaking_changes_json(&proposal.breaking_changes)?)
        .bind(change_type_str(proposal.change_type))
        .bind(proposal_status_str(proposal.status))
        .bind(&proposal.snapshot_consumers)
        .bind(proposal.proposed_by)
        .bind(proposal.proposed_at)
        .bind(proposal.resolved_at)
        .execute(self.conn())
        .await?;
        Ok(())
    }

    async fn update_proposal(&mut self, proposal: &Proposal) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            update workflow.proposals
            set status = $2, resolved_at = $3
            where id = $1
            "#,
        )
        .bind(proposal.id)
        .bind(proposal_status_str(proposal.status))
        .bind(proposal.resolved_at)
        .execute(self.conn())
        .await?;
        Ok(())
    }

    async fn get_acknowledgment(
        &mut self,
        proposal_id: Uuid,
        consumer_team_id: Uuid,
    ) -> anyhow::Result<Option<Acknowledgment>> {
        let row = sqlx::query(
            "select * from workflow.acknowledgments where proposal_id = $1 and consumer_team_id = $2",
        )
        .bind(proposal_id)
        .bind(consumer_team_id)
        .fetch_optional(self.conn())
        .await?;
        row.as_ref().map(acknowledgment_from_row).transpose()
    }

    async fn list_acknowledgments(
        &mut self,
        proposal_id: Uuid,
    ) -> anyhow::Result<Vec<Acknowledgment>> {
        let rows = sqlx::query("select * from workflow.acknowledgments where proposal_id = $1")
            .bind(proposal_id)
            .fetch_all(self.conn())
            .await?;
        rows.iter().map(acknowledgment_from_row).collect()
    }

    async fn upsert_acknowledgment(&mut self, ack: &Acknowledgment) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            insert into workflow.acknowledgments
                (id, proposal_id, consumer_team_id, response, migration_deadline, notes, responded_at)
            values ($1, $2, $3, $4, $5, $6, $7)
            on conflict (proposal_id, consumer_team_id) do update
            set response = excluded.response,
                migration_deadline = excluded.migration_deadline,
                notes = excluded.notes,
                responded_at = excluded.responded_at
            "#,
        )
        .bind(ack.id)
        .bind(ack.proposal_id)
        .bind(ack.consumer_team_id)
        .bind(ack_response_str(ack.response))
        .bind(ack.migration_deadline)
        .bind(&ack.notes)
        .bind(ack.responded_at)
        .execute(self.conn())
        .await?;
        Ok(())
    }

    async fn list_active_registrations(
        &mut self,
        asset_id: Uuid,
    ) -> anyhow::Result<Vec<Registration>> {
        let rows = sqlx::query(
            r#"
            select r.* from core.registrations r
            join core.teams t on t.id = r.consumer_team_id
            where r.asset_id = $1 and r.status = 'active' and t.deleted_at is null
            "#,
        )
        .bind(asset_id)
        .fetch_all(self.conn())
        .await?;
        rows.iter().map(registration_from_row).collect()
    }

    async fn insert_registration(&mut self, registration: &Registration) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            insert into core.registrations
                (id, asset_id, consumer_team_id, pinned_version, status, registered_at)
            values ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(registration.id)
        .bind(registration.asset_id)
        .bind(registration.consumer_team_id)
        .bind(registration.pinned_version.as_ref().map(|v| v.to_string()))
        .bind(registration_status_str(registration.status))
        .bind(registration.registered_at)
        .execute(self.conn())
        .await?;
        Ok(())
    }

    async fn update_registration_status(
        &mut self,
        id: Uuid,
        status: RegistrationStatus,
    ) -> anyhow::Result<()> {
        sqlx::query("update core.registrations set status = $2 where id = $1")
            .bind(id)
            .bind(registration_status_str(status))
            .execute(self.conn())
            .await?;
        Ok(())
    }

    async fn insert_team(&mut self, team: &Team) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            insert into core.teams (id, name, slug, metadata, created_at, deleted_at)
            values ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(team.id)
        .bind(&team.name)
        .bind(&team.slug)
        .bind(serde_json::to_value(&team.metadata)?)
        .bind(team.created_at)
        .bind(team.deleted_at)
        .execute(self.conn())
        .await?;
        Ok(())
    }

    async fn soft_delete_team(&mut self, id: Uuid, at: DateTime<Utc>) -> anyhow::Result<()> {
        sqlx::query("update core.teams set deleted_at = $2 where id = $1")
            .bind(id)
            .bind(at)
            .execute(self.conn())
            .await?;
        Ok(())
    }

    async fn insert_api_key(&mut self, key: &ApiKey) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            insert into core.api_keys (id, team_id, scope, key_hash, created_at, revoked_at)
            values ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(key.id)
        .bind(key.team_id)
        .bind(api_scope_str(key.scope))
        .bind(&key.key_hash)
        .bind(key.created_at)
        .bind(key.revoked_at)
        .execute(self.conn())
        .await?;
        Ok(())
    }

    async fn revoke_api_key(&mut self, id: Uuid, at: DateTime<Utc>) -> anyhow::Result<()> {
        sqlx::query("update core.api_keys set revoked_at = $2 where id = $1")
            .bind(id)
            .bind(at)
            .execute(self.conn())
            .await?;
        Ok(())
    }

    async fn append_audit(&mut self, event: NewAuditEvent) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            insert into audit.events (id, entity_type, entity_id, action, actor_id, payload, occurred_at)
            values ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(event.entity_type)
        .bind(event.entity_id)
        .bind(event.action)
        .bind(event.actor_id)
        .bind(event.payload)
        .bind(event.occurred_at)
        .execute(self.conn())
        .await?;
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> anyhow::Result<()> {
        self.tx.take().expect("transaction already finalised").commit().await?;
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> anyhow::Result<()> {
        self.tx.take().expect("transaction already finalised").rollback().await?;
        Ok(())
    }
}
