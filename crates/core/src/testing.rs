//! In-memory fakes for the core's external ports. Exercised by this crate's
//! own unit/integration tests; not exposed outside `#[cfg(test)]` builds of
//! dependents.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::entities::{
    Acknowledgment, ApiKey, Asset, Contract, Proposal, Registration, RegistrationStatus, Team,
};
use crate::ports::{Clock, IdGenerator, NewAuditEvent, Notifier, Store, Tx};

#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub entity_type: &'static str,
    pub entity_id: Uuid,
    pub action: &'static str,
    pub actor_id: Uuid,
    pub payload: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Default)]
struct World {
    assets: HashMap<Uuid, Asset>,
    contracts: HashMap<Uuid, Contract>,
    proposals: HashMap<Uuid, Proposal>,
    acknowledgments: HashMap<(Uuid, Uuid), Acknowledgment>,
    registrations: HashMap<Uuid, Registration>,
    teams: HashMap<Uuid, Team>,
    api_keys: HashMap<Uuid, ApiKey>,
    audit: Vec<AuditRecord>,
}

/// A shared, in-memory world that [`FakeTx`]s read and write directly —
/// there is no isolation between open transactions, matching the
/// serializable-in-practice behaviour the real store provides via row locks.
#[derive(Clone, Default)]
pub struct FakeStore {
    world: Arc<Mutex<World>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for FakeStore {
    async fn begin(&self) -> anyhow::Result<Box<dyn Tx>> {
        Ok(Box::new(FakeTx {
            world: self.world.clone(),
        }))
    }
}

/// A standalone transaction handle usable directly in unit tests without
/// going through [`FakeStore::begin`].
pub struct FakeTx {
    world: Arc<Mutex<World>>,
}

impl FakeTx {
    pub fn new() -> Self {
        Self {
            world: Arc::new(Mutex::new(World::default())),
        }
    }

    pub fn seed_asset(&mut self, asset: Asset) {
        self.world.lock().unwrap().assets.insert(asset.id, asset);
    }

    pub fn seed_contract(&mut self, contract: Contract) {
        self.world
            .lock()
            .unwrap()
            .contracts
            .insert(contract.id, contract);
    }

    pub fn seed_proposal(&mut self, proposal: Proposal) {
        self.world
            .lock()
            .unwrap()
            .proposals
            .insert(proposal.id, proposal);
    }

    pub fn seed_active_registration(&mut self, asset_id: Uuid, consumer_team_id: Uuid) {
        let registration = Registration {
            id: Uuid::new_v4(),
            asset_id,
            consumer_team_id,
            pinned_version: None,
            status: RegistrationStatus::Active,
            registered_at: Utc::now(),
        };
        self.world
            .lock()
            .unwrap()
            .registrations
            .insert(registration.id, registration);
    }

    pub fn audit_log(&self) -> Vec<AuditRecord> {
        self.world.lock().unwrap().audit.clone()
    }
}

impl Default for FakeTx {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tx for FakeTx {
    async fn get_asset(&mut self, id: Uuid) -> anyhow::Result<Option<Asset>> {
        Ok(self.world.lock().unwrap().assets.get(&id).cloned())
    }

    async fn get_asset_by_fqn(&mut self, fqn: &str) -> anyhow::Result<Option<Asset>> {
        Ok(self
            .world
            .lock()
            .unwrap()
            .assets
            .values()
            .find(|a| a.fqn == fqn)
            .cloned())
    }

    async fn lock_asset(&mut self, _id: Uuid) -> anyhow::Result<()> {
        Ok(())
    }

    async fn insert_asset(&mut self, asset: &Asset) -> anyhow::Result<()> {
        self.world
            .lock()
            .unwrap()
            .assets
            .insert(asset.id, asset.clone());
        Ok(())
    }

    async fn soft_delete_asset(&mut self, id: Uuid, at: DateTime<Utc>) -> anyhow::Result<()> {
        if let Some(asset) = self.world.lock().unwrap().assets.get_mut(&id) {
            asset.deleted_at = Some(at);
        }
        Ok(())
    }

    async fn set_current_contract(
        &mut self,
        asset_id: Uuid,
        contract_id: Option<Uuid>,
    ) -> anyhow::Result<()> {
        if let Some(asset) = self.world.lock().unwrap().assets.get_mut(&asset_id) {
            asset.current_contract_id = contract_id;
        }
        Ok(())
    }

    async fn get_contract(&mut self, id: Uuid) -> anyhow::Result<Option<Contract>> {
        Ok(self.world.lock().unwrap().contracts.get(&id).cloned())
    }

    async fn get_active_contract(&mut self, asset_id: Uuid) -> anyhow::Result<Option<Contract>> {
        use crate::entities::ContractStatus;
        Ok(self
            .world
            .lock()
            .unwrap()
            .contracts
            .values()
            .find(|c| c.asset_id == asset_id && c.status == ContractStatus::Active)
            .cloned())
    }

    async fn insert_contract(&mut self, contract: &Contract) -> anyhow::Result<()> {
        self.world
            .lock()
            .unwrap()
            .contracts
            .insert(contract.id, contract.clone());
        Ok(())
    }

    async fn deprecate_contract(&mut self, id: Uuid) -> anyhow::Result<()> {
        use crate::entities::ContractStatus;
        if let Some(contract) = self.world.lock().unwrap().contracts.get_mut(&id) {
            contract.status = ContractStatus::Deprecated;
        }
        Ok(())
    }

    async fn get_pending_proposal(&mut self, asset_id: Uuid) -> anyhow::Result<Option<Proposal>> {
        use crate::entities::ProposalStatus;
        Ok(self
            .world
            .lock()
            .unwrap()
            .proposals
            .values()
            .find(|p| p.asset_id == asset_id && p.status == ProposalStatus::Pending)
            .cloned())
    }

    async fn get_proposal(&mut self, id: Uuid) -> anyhow::Result<Option<Proposal>> {
        Ok(self.world.lock().unwrap().proposals.get(&id).cloned())
    }

    async fn insert_proposal(&mut self, proposal: &Proposal) -> anyhow::Result<()> {
        self.world
            .lock()
            .unwrap()
            .proposals
            .insert(proposal.id, proposal.clone());
        Ok(())
    }

    async fn update_proposal(&mut self, proposal: &Proposal) -> anyhow::Result<()> {
        self.world
            .lock()
            .unwrap()
            .proposals
            .insert(proposal.id, proposal.clone());
        Ok(())
    }

    async fn get_acknowledgment(
        &mut self,
        proposal_id: Uuid,
        consumer_team_id: Uuid,
    ) -> anyhow::Result<Option<Acknowledgment>> {
        Ok(self
            .world
            .lock()
            .unwrap()
            .acknowledgments
            .get(&(proposal_id, consumer_team_id))
            .cloned())
    }

    async fn list_acknowledgments(
        &mut self,
        proposal_id: Uuid,
    ) -> anyhow::Result<Vec<Acknowledgment>> {
        Ok(self
            .world
            .lock()
            .unwrap()
            .acknowledgments
            .values()
            .filter(|a| a.proposal_id == proposal_id)
            .cloned()
            .collect())
    }

    async fn upsert_acknowledgment(&mut self, ack: &Acknowledgment) -> anyhow::Result<()> {
        self.world
            .lock()
            .unwrap()
            .acknowledgments
            .insert((ack.proposal_id, ack.consumer_team_id), ack.clone());
        Ok(())
    }

    async fn list_active_registrations(
        &mut self,
        asset_id: Uuid,
    ) -> anyhow::Result<Vec<Registration>> {
        Ok(self
            .world
            .lock()
            .unwrap()
            .registrations
            .values()
            .filter(|r| r.asset_id == asset_id && r.status == RegistrationStatus::Active)
            .cloned()
            .collect())
    }

    async fn insert_registration(&mut self, registration: &Registration) -> anyhow::Result<()> {
        self.world
            .lock()
            .unwrap()
            .registrations
            .insert(registration.id, registration.clone());
        Ok(())
    }

    async fn update_registration_status(
        &mut self,
        id: Uuid,
        status: RegistrationStatus,
    ) -> anyhow::Result<()> {
        if let Some(registration) = self.world.lock().unwrap().registrations.get_mut(&id) {
            registration.status = status;
        }
        Ok(())
    }

    async fn insert_team(&mut self, team: &Team) -> anyhow::Result<()> {
        self.world.lock().unwrap().teams.insert(team.id, team.clone());
        Ok(())
    }

    async fn soft_delete_team(&mut self, id: Uuid, at: DateTime<Utc>) -> anyhow::Result<()> {
        if let Some(team) = self.world.lock().unwrap().teams.get_mut(&id) {
            team.deleted_at = Some(at);
        }
        Ok(())
    }

    async fn insert_api_key(&mut self, key: &ApiKey) -> anyhow::Result<()> {
        self.world.lock().unwrap().api_keys.insert(key.id, key.clone());
        Ok(())
    }

    async fn revoke_api_key(&mut self, id: Uuid, at: DateTime<Utc>) -> anyhow::Result<()> {
        if let Some(key) = self.world.lock().unwrap().api_keys.get_mut(&id) {
            key.revoked_at = Some(at);
        }
        Ok(())
    }

    async fn append_audit(&mut self, event: NewAuditEvent) -> anyhow::Result<()> {
        self.world.lock().unwrap().audit.push(AuditRecord {
            entity_type: event.entity_type,
            entity_id: event.entity_id,
            action: event.action,
            actor_id: event.actor_id,
            payload: event.payload,
            occurred_at: event.occurred_at,
        });
        Ok(())
    }

    async fn commit(self: Box<Self>) -> anyhow::Result<()> {
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> anyhow::Result<()> {
        Ok(())
    }
}

/// A clock pinned to a fixed instant, advanced manually between test steps.
pub struct FakeClock {
    now: Mutex<DateTime<Utc>>,
}

impl FakeClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, delta: chrono::Duration) {
        let mut now = self.now.lock().unwrap();
        *now += delta;
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Hands out sequential ids so test assertions can be deterministic about
/// ordering when that matters.
#[derive(Default)]
pub struct FakeIdGenerator {
    next: Mutex<u128>,
}

impl FakeIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for FakeIdGenerator {
    fn new_id(&self) -> Uuid {
        let mut next = self.next.lock().unwrap();
        *next += 1;
        Uuid::from_u128(*next)
    }
}

/// Records every notification it receives instead of sending anything.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(Uuid, Vec<Uuid>)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_proposal_opened(&self, proposal: &Proposal, consumer_team_ids: &[Uuid]) {
        self.sent
            .lock()
            .unwrap()
            .push((proposal.id, consumer_team_ids.to_vec()));
    }
}
