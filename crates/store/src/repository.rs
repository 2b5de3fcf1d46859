//! CRUD surface the HTTP API needs that isn't part of the coordination
//! core's `Tx` port: teams, plain registration/asset/contract reads,
//! lineage edges, API keys, and audit queries. None of this participates
//! in the publish/proposal state machines, so it talks to the pool
//! directly rather than through a `Tx`.

use chrono::{DateTime, Utc};
use contractor_core::entities::{
    Acknowledgment, ApiKey, Asset, AssetDependency, Contract, Proposal, Registration, Team,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::postgres::rows::{
    acknowledgment_from_row, asset_from_row, contract_from_row, parse_api_scope, proposal_from_row,
    registration_from_row,
};

pub struct Repository {
    pool: PgPool,
}

/// A single page of audit events plus the cursor to pass back for the next.
pub struct AuditPage {
    pub events: Vec<AuditEvent>,
    pub next_cursor: Option<(DateTime<Utc>, Uuid)>,
}

#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub id: Uuid,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub action: String,
    pub actor_id: Uuid,
    pub payload: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

/// Filters accepted by the audit query endpoint. All are optional/ANDed.
#[derive(Debug, Default)]
pub struct AuditFilter {
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub action: Option<String>,
    pub after: Option<(DateTime<Utc>, Uuid)>,
    pub limit: i64,
}

impl Repository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // -- teams --------------------------------------------------------

    pub async fn create_team(&self, team: &Team) -> anyhow::Result<()> {
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
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_team(&self, id: Uuid) -> anyhow::Result<Option<Team>> {
        let row = sqlx::query("select * from core.teams where id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(team_from_row).transpose()
    }

    pub async fn get_team_by_slug(&self, slug: &str) -> anyhow::Result<Option<Team>> {
        let row = sqlx::query("select * from core.teams where slug = $1 and deleted_at is null")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(team_from_row).transpose()
    }

    pub async fn list_teams(&self) -> anyhow::Result<Vec<Team>> {
        let rows = sqlx::query("select * from core.teams where deleted_at is null order by name")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(team_from_row).collect()
    }

    // -- assets / contracts (read paths for the HTTP layer) ------------

    pub async fn get_asset(&self, id: Uuid) -> anyhow::Result<Option<Asset>> {
        let row = sqlx::query("select * from core.assets where id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(asset_from_row).transpose()
    }

    pub async fn list_assets(&self, owner_team_id: Option<Uuid>) -> anyhow::Result<Vec<Asset>> {
        let rows = match owner_team_id {
            Some(team_id) => {
                sqlx::query(
                    "select * from core.assets where deleted_at is null and owner_team_id = $1 order by fqn",
                )
                .bind(team_id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("select * from core.assets where deleted_at is null order by fqn")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.iter().map(asset_from_row).collect()
    }

    pub async fn list_contracts(&self, asset_id: Uuid) -> anyhow::Result<Vec<Contract>> {
        let rows = sqlx::query(
            "select * from core.contracts where asset_id = $1 order by published_at desc",
        )
        .bind(asset_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(contract_from_row).collect()
    }

    pub async fn get_contract_by_version(
        &self,
        asset_id: Uuid,
        version: &str,
    ) -> anyhow::Result<Option<Contract>> {
        let row = sqlx::query("select * from core.contracts where asset_id = $1 and version = $2")
            .bind(asset_id)
            .bind(version)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(contract_from_row).transpose()
    }

    pub async fn get_proposal(&self, id: Uuid) -> anyhow::Result<Option<Proposal>> {
        let row = sqlx::query("select * from workflow.proposals where id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(proposal_from_row).transpose()
    }

    pub async fn list_proposals(&self, asset_id: Uuid) -> anyhow::Result<Vec<Proposal>> {
        let rows = sqlx::query(
            "select * from workflow.proposals where asset_id = $1 order by proposed_at desc",
        )
        .bind(asset_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(proposal_from_row).collect()
    }

    pub async fn list_acknowledgments(
        &self,
        proposal_id: Uuid,
    ) -> anyhow::Result<Vec<Acknowledgment>> {
        let rows = sqlx::query("select * from workflow.acknowledgments where proposal_id = $1")
            .bind(proposal_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(acknowledgment_from_row).collect()
    }

    // -- registrations --------------------------------------------------

    pub async fn get_registration(&self, id: Uuid) -> anyhow::Result<Option<Registration>> {
        let row = sqlx::query("select * from core.registrations where id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(registration_from_row).transpose()
    }

    pub async fn list_registrations_for_consumer(
        &self,
        consumer_team_id: Uuid,
    ) -> anyhow::Result<Vec<Registration>> {
        let rows = sqlx::query(
            "select * from core.registrations where consumer_team_id = $1 order by registered_at desc",
        )
        .bind(consumer_team_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(registration_from_row).collect()
    }

    // -- lineage ---------------------------------------------------------

    pub async fn add_dependency(&self, dep: AssetDependency) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            insert into core.asset_dependencies (upstream_asset_id, downstream_asset_id)
            values ($1, $2)
            on conflict do nothing
            "#,
        )
        .bind(dep.upstream_asset_id)
        .bind(dep.downstream_asset_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_downstream(&self, upstream_asset_id: Uuid) -> anyhow::Result<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "select downstream_asset_id from core.asset_dependencies where upstream_asset_id = $1",
        )
        .bind(upstream_asset_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    // -- api keys ----------------------------------------------------------

    pub async fn get_api_key(&self, id: Uuid) -> anyhow::Result<Option<ApiKey>> {
        let row = sqlx::query("select * from core.api_keys where id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(api_key_from_row).transpose()
    }

    pub async fn get_api_key_by_hash(&self, key_hash: &str) -> anyhow::Result<Option<ApiKey>> {
        let row = sqlx::query("select * from core.api_keys where key_hash = $1")
            .bind(key_hash)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(api_key_from_row).transpose()
    }

    pub async fn list_api_keys(&self, team_id: Uuid) -> anyhow::Result<Vec<ApiKey>> {
        let rows = sqlx::query("select * from core.api_keys where team_id = $1")
            .bind(team_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(api_key_from_row).collect()
    }

    // -- audit ---------------------------------------------------------

    pub async fn query_audit(&self, filter: &AuditFilter) -> anyhow::Result<AuditPage> {
        let mut sql = String::from("select * from audit.events where true");
        let mut clause = 1;

        if filter.entity_type.is_some() {
            clause += 1;
            sql.push_str(&format!(" and entity_type = ${clause}"));
        }
        if filter.entity_id.is_some() {
            clause += 1;
            sql.push_str(&format!(" and entity_id = ${clause}"));
        }
        if filter.actor_id.is_some() {
            clause += 1;
            sql.push_str(&format!(" and actor_id = ${clause}"));
        }
        if filter.action.is_some() {
            clause += 1;
            sql.push_str(&format!(" and action = ${clause}"));
        }
        if filter.after.is_some() {
            clause += 1;
            let cursor_time_idx = clause;
            clause += 1;
            sql.push_str(&format!(
                " and (occurred_at, id) > (${cursor_time_idx}, ${clause})"
            ));
        }
        sql.push_str(" order by occurred_at, id limit ");
        let limit = filter.limit.clamp(1, 500);
        sql.push_str(&(limit + 1).to_string());

        let mut query = sqlx::query(&sql);
        if let Some(v) = &filter.entity_type {
            query = query.bind(v);
        }
        if let Some(v) = filter.entity_id {
            query = query.bind(v);
        }
        if let Some(v) = filter.actor_id {
            query = query.bind(v);
        }
        if let Some(v) = &filter.action {
            query = query.bind(v);
        }
        if let Some((ts, id)) = filter.after {
            query = query.bind(ts).bind(id);
        }

        let rows = query.fetch_all(&self.pool).await?;
        let mut events: Vec<AuditEvent> =
            rows.iter().map(audit_event_from_row).collect::<anyhow::Result<_>>()?;

        let next_cursor = if events.len() as i64 > limit {
            events.truncate(limit as usize);
            events.last().map(|e| (e.occurred_at, e.id))
        } else {
            None
        };

        Ok(AuditPage { events, next_cursor })
    }
}

fn team_from_row(row: &sqlx::postgres::PgRow) -> anyhow::Result<Team> {
    use sqlx::Row;
    let metadata: serde_json::Value = row.try_get("metadata")?;
    let map = match metadata {
        serde_json::Value::Object(m) => m.into_iter().collect(),
        _ => Default::default(),
    };
    Ok(Team {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        metadata: map,
        created_at: row.try_get("created_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

fn api_key_from_row(row: &sqlx::postgres::PgRow) -> anyhow::Result<ApiKey> {
    use sqlx::Row;
    let scope: String = row.try_get("scope")?;
    Ok(ApiKey {
        id: row.try_get("id")?,
        team_id: row.try_get("team_id")?,
        scope: parse_api_scope(&scope)?,
        key_hash: row.try_get("key_hash")?,
        created_at: row.try_get("created_at")?,
        revoked_at: row.try_get("revoked_at")?,
    })
}

fn audit_event_from_row(row: &sqlx::postgres::PgRow) -> anyhow::Result<AuditEvent> {
    use sqlx::Row;
    Ok(AuditEvent {
        id: row.try_get("id")?,
        entity_type: row.try_get("entity_type")?,
        entity_id: row.try_get("entity_id")?,
        action: row.try_get("action")?,
        actor_id: row.try_get("actor_id")?,
        payload: row.try_get("payload")?,
        occurred_at: row.try_get("occurred_at")?,
    })
}
