//! The external interfaces the core depends on: a transactional store, a
//! clock, an id generator, and a notifier. Concrete implementations (e.g.
//! the Postgres-backed store in `contractor-store`) live outside this crate;
//! the core only ever talks to these traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::entities::{
    Acknowledgment, ApiKey, Asset, Contract, Proposal, Registration, RegistrationStatus, Team,
};

/// A single audit log entry about to be appended. `occurred_at` is supplied
/// by the caller (via [`Clock`]) so the whole write stays deterministic in
/// tests.
#[derive(Debug, Clone)]
pub struct NewAuditEvent {
    pub entity_type: &'static str,
    pub entity_id: Uuid,
    pub action: &'static str,
    pub actor_id: Uuid,
    pub payload: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

/// Opens transactions. The only required linearisation point is the
/// asset-row lock taken inside a transaction via [`Tx::lock_asset`].
#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> anyhow::Result<Box<dyn Tx>>;
}

/// A single serialisable transaction. Every method may suspend; none of
/// them are called from the pure differ/classifier/impact-analyzer code.
#[async_trait]
pub trait Tx: Send {
    async fn get_asset(&mut self, id: Uuid) -> anyhow::Result<Option<Asset>>;
    async fn get_asset_by_fqn(&mut self, fqn: &str) -> anyhow::Result<Option<Asset>>;
    /// Advisory / row lock serialising concurrent publishers on this asset.
    async fn lock_asset(&mut self, id: Uuid) -> anyhow::Result<()>;
    async fn insert_asset(&mut self, asset: &Asset) -> anyhow::Result<()>;
    async fn soft_delete_asset(&mut self, id: Uuid, at: DateTime<Utc>) -> anyhow::Result<()>;
    async fn set_current_contract(
        &mut self,
        asset_id: Uuid,
        contract_id: Option<Uuid>,
    ) -> anyhow::Result<()>;

    async fn get_contract(&mut self, id: Uuid) -> anyhow::Result<Option<Contract>>;
    async fn get_active_contract(&mut self, asset_id: Uuid) -> anyhow::Result<Option<Contract>>;
    async fn insert_contract(&mut self, contract: &Contract) -> anyhow::Result<()>;
    async fn deprecate_contract(&mut self, id: Uuid) -> anyhow::Result<()>;

    async fn get_pending_proposal(&mut self, asset_id: Uuid) -> anyhow::Result<Option<Proposal>>;
    async fn get_proposal(&mut self, id: Uuid) -> anyhow::Result<Option<Proposal>>;
    async fn insert_proposal(&mut self, proposal: &Proposal) -> anyhow::Result<()>;
    async fn update_proposal(&mut self, proposal: &Proposal) -> anyhow::Result<()>;

    async fn get_acknowledgment(
        &mut self,
        proposal_id: Uuid,
        consumer_team_id: Uuid,
    ) -> anyhow::Result<Option<Acknowledgment>>;
    async fn list_acknowledgments(
        &mut self,
        proposal_id: Uuid,
    ) -> anyhow::Result<Vec<Acknowledgment>>;
    async fn upsert_acknowledgment(&mut self, ack: &Acknowledgment) -> anyhow::Result<()>;

    /// Active, non-soft-deleted registrations on an asset (invariant 8).
    async fn list_active_registrations(
        &mut self,
        asset_id: Uuid,
    ) -> anyhow::Result<Vec<Registration>>;

    async fn insert_registration(&mut self, registration: &Registration) -> anyhow::Result<()>;
    async fn update_registration_status(
        &mut self,
        id: Uuid,
        status: RegistrationStatus,
    ) -> anyhow::Result<()>;

    async fn insert_team(&mut self, team: &Team) -> anyhow::Result<()>;
    async fn soft_delete_team(&mut self, id: Uuid, at: DateTime<Utc>) -> anyhow::Result<()>;

    async fn insert_api_key(&mut self, key: &ApiKey) -> anyhow::Result<()>;
    async fn revoke_api_key(&mut self, id: Uuid, at: DateTime<Utc>) -> anyhow::Result<()>;

    /// Appended in the same transaction as the mutation it records — never
    /// commit-then-audit.
    async fn append_audit(&mut self, event: NewAuditEvent) -> anyhow::Result<()>;

    async fn commit(self: Box<Self>) -> anyhow::Result<()>;
    async fn rollback(self: Box<Self>) -> anyhow::Result<()>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub trait IdGenerator: Send + Sync {
    fn new_id(&self) -> Uuid;
}

/// Wall-clock [`Clock`] used outside of tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Random-uuid [`IdGenerator`] used outside of tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn new_id(&self) -> Uuid {
        Uuid::new_v4()
    }
}

/// Fanned out after a successful commit of a proposal open. May be a no-op.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_proposal_opened(&self, proposal: &Proposal, consumer_team_ids: &[Uuid]);
}

/// A notifier that does nothing; the default when none is configured.
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn notify_proposal_opened(&self, _proposal: &Proposal, _consumer_team_ids: &[Uuid]) {}
}
