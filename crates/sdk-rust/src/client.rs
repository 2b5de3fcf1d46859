//! HTTP client for the data contract coordination service.

use std::time::Duration;

use contractor_core::coordinator::PublishOutcome;
use contractor_core::entities::{Asset, Contract, Proposal, Registration, Team};
use contractor_core::impact::ImpactReport;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, SdkError};
use crate::types::*;

/// Retry configuration for transient failures (connection resets, 5xx).
#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 100,
            max_delay_ms: 5000,
            backoff_multiplier: 2.0,
        }
    }
}

#[derive(Clone)]
pub struct ContractorClient {
    base_url: String,
    http: reqwest::Client,
    api_key: Option<String>,
    retry_config: RetryConfig,
}

impl ContractorClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_retry_config(base_url, RetryConfig::default())
    }

    pub fn with_retry_config(base_url: impl Into<String>, retry_config: RetryConfig) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            api_key: None,
            retry_config,
        }
    }

    /// Attach a bearer API key to every subsequent request.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    async fn retry<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        let mut delay_ms = self.retry_config.initial_delay_ms;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    attempt += 1;
                    if !e.is_retryable() || attempt >= self.retry_config.max_retries {
                        return Err(e);
                    }
                    debug!(attempt, delay_ms, error = %e, "retrying request");
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    delay_ms = ((delay_ms as f64) * self.retry_config.backoff_multiplier) as u64;
                    delay_ms = delay_ms.min(self.retry_config.max_delay_ms);
                }
            }
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.http.request(method, url);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        req
    }

    async fn send<T: serde::de::DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<T> {
        // Bodies here are always `None` or a serialized JSON buffer, both cloneable.
        self.retry(|| async {
            let resp = req.try_clone().expect("request body is always cloneable").send().await?;
            Self::read_body(resp).await
        })
        .await
    }

    async fn read_body<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
        let status = resp.status();
        let url = resp.url().to_string();

        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let (code, message) = match serde_json::from_str::<ErrorBody>(&text) {
                Ok(body) => (body.error.code, body.error.message),
                Err(_) => (status.canonical_reason().unwrap_or("error").to_string(), text),
            };
            return Err(SdkError::Api { status: status.as_u16(), code, message });
        }

        let bytes = resp.bytes().await.map_err(SdkError::from)?;
        serde_json::from_slice(&bytes).map_err(|e| SdkError::JsonParse {
            context: url,
            error: e.to_string(),
        })
    }

    // -- teams ----------------------------------------------------------

    pub async fn create_team(&self, req: &CreateTeamRequest) -> Result<Team> {
        self.send(self.request(reqwest::Method::POST, "/api/v1/teams").json(req)).await
    }

    pub async fn list_teams(&self) -> Result<Vec<Team>> {
        self.send(self.request(reqwest::Method::GET, "/api/v1/teams")).await
    }

    pub async fn get_team(&self, id: Uuid) -> Result<Team> {
        self.send(self.request(reqwest::Method::GET, &format!("/api/v1/teams/{id}"))).await
    }

    pub async fn delete_team(&self, id: Uuid) -> Result<()> {
        self.send::<serde_json::Value>(self.request(reqwest::Method::DELETE, &format!("/api/v1/teams/{id}")))
            .await
            .map(|_| ())
    }

    // -- assets -----------------------------------------------------------

    pub async fn create_asset(&self, req: &CreateAssetRequest) -> Result<Asset> {
        self.send(self.request(reqwest::Method::POST, "/api/v1/assets").json(req)).await
    }

    pub async fn list_assets(&self, owner_team_id: Option<Uuid>) -> Result<Vec<Asset>> {
        let mut req = self.request(reqwest::Method::GET, "/api/v1/assets");
        if let Some(id) = owner_team_id {
            req = req.query(&[("owner_team_id", id.to_string())]);
        }
        self.send(req).await
    }

    pub async fn get_asset(&self, id: Uuid) -> Result<Asset> {
        self.send(self.request(reqwest::Method::GET, &format!("/api/v1/assets/{id}"))).await
    }

    pub async fn delete_asset(&self, id: Uuid) -> Result<()> {
        self.send::<serde_json::Value>(self.request(reqwest::Method::DELETE, &format!("/api/v1/assets/{id}")))
            .await
            .map(|_| ())
    }

    pub async fn publish_contract(
        &self,
        asset_id: Uuid,
        req: &PublishContractRequest,
    ) -> Result<PublishOutcome> {
        self.send(
            self.request(reqwest::Method::POST, &format!("/api/v1/assets/{asset_id}/contracts"))
                .json(req),
        )
        .await
    }

    pub async fn list_contracts(&self, asset_id: Uuid) -> Result<Vec<Contract>> {
        self.send(self.request(reqwest::Method::GET, &format!("/api/v1/assets/{asset_id}/contracts")))
            .await
    }

    pub async fn get_contract(&self, id: Uuid) -> Result<Contract> {
        self.send(self.request(reqwest::Method::GET, &format!("/api/v1/contracts/{id}"))).await
    }

    pub async fn compare(&self, asset_id: Uuid, req: &CompareRequest) -> Result<CompareResponse> {
        self.send(
            self.request(reqwest::Method::POST, &format!("/api/v1/assets/{asset_id}/compare")).json(req),
        )
        .await
    }

    pub async fn get_impact(
        &self,
        asset_id: Uuid,
        proposed_schema: Option<&serde_json::Value>,
    ) -> Result<ImpactReport> {
        let mut req = self.request(reqwest::Method::GET, &format!("/api/v1/assets/{asset_id}/impact"));
        if let Some(schema) = proposed_schema {
            req = req.query(&[("proposed_schema", schema.to_string())]);
        }
        self.send(req).await
    }

    // -- registrations ----------------------------------------------------

    pub async fn create_registration(&self, req: &CreateRegistrationRequest) -> Result<Registration> {
        self.send(self.request(reqwest::Method::POST, "/api/v1/registrations").json(req)).await
    }

    pub async fn list_registrations_for_consumer(&self, consumer_team_id: Uuid) -> Result<Vec<Registration>> {
        self.send(
            self.request(reqwest::Method::GET, "/api/v1/registrations")
                .query(&[("consumer_team_id", consumer_team_id.to_string())]),
        )
        .await
    }

    pub async fn update_registration(
        &self,
        id: Uuid,
        req: &UpdateRegistrationRequest,
    ) -> Result<Registration> {
        self.send(
            self.request(reqwest::Method::PATCH, &format!("/api/v1/registrations/{id}")).json(req),
        )
        .await
    }

    // -- proposals ---------------------------------------------------------

    pub async fn list_proposals(&self, asset_id: Uuid) -> Result<Vec<Proposal>> {
        self.send(
            self.request(reqwest::Method::GET, "/api/v1/proposals")
                .query(&[("asset_id", asset_id.to_string())]),
        )
        .await
    }

    pub async fn get_proposal(&self, id: Uuid) -> Result<Proposal> {
        self.send(self.request(reqwest::Method::GET, &format!("/api/v1/proposals/{id}"))).await
    }

    pub async fn acknowledge(&self, id: Uuid, req: &AcknowledgeRequest) -> Result<Proposal> {
        self.send(
            self.request(reqwest::Method::POST, &format!("/api/v1/proposals/{id}/acknowledge")).json(req),
        )
        .await
    }

    pub async fn withdraw(&self, id: Uuid, req: &WithdrawRequest) -> Result<Proposal> {
        self.send(
            self.request(reqwest::Method::POST, &format!("/api/v1/proposals/{id}/withdraw")).json(req),
        )
        .await
    }

    pub async fn force(&self, id: Uuid, req: &ActorRequest) -> Result<Proposal> {
        self.send(self.request(reqwest::Method::POST, &format!("/api/v1/proposals/{id}/force")).json(req))
            .await
    }

    pub async fn publish_proposal(&self, id: Uuid, req: &ActorRequest) -> Result<Proposal> {
        self.send(
            self.request(reqwest::Method::POST, &format!("/api/v1/proposals/{id}/publish")).json(req),
        )
        .await
    }

    // -- API keys -----------------------------------------------------------

    pub async fn create_api_key(&self, req: &CreateApiKeyRequest) -> Result<ApiKeyCreatedResponse> {
        self.send(self.request(reqwest::Method::POST, "/api/v1/api-keys").json(req)).await
    }

    pub async fn list_api_keys(&self, team_id: Uuid) -> Result<Vec<ApiKeySummary>> {
        self.send(
            self.request(reqwest::Method::GET, "/api/v1/api-keys")
                .query(&[("team_id", team_id.to_string())]),
        )
        .await
    }

    pub async fn revoke_api_key(&self, id: Uuid) -> Result<()> {
        self.send::<serde_json::Value>(
            self.request(reqwest::Method::DELETE, &format!("/api/v1/api-keys/{id}")),
        )
        .await
        .map(|_| ())
    }

    // -- audit / health ------------------------------------------------------

    pub async fn query_audit(&self, query: &AuditQuery) -> Result<AuditPageResponse> {
        let mut pairs = Vec::new();
        if let Some(v) = &query.entity_type {
            pairs.push(("entity_type", v.clone()));
        }
        if let Some(v) = query.entity_id {
            pairs.push(("entity_id", v.to_string()));
        }
        if let Some(v) = query.actor_id {
            pairs.push(("actor_id", v.to_string()));
        }
        if let Some(v) = &query.action {
            pairs.push(("action", v.clone()));
        }
        if let Some(v) = &query.cursor {
            pairs.push(("cursor", v.clone()));
        }
        if let Some(v) = query.limit {
            pairs.push(("limit", v.to_string()));
        }

        self.send(self.request(reqwest::Method::GET, "/api/v1/audit").query(&pairs)).await
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        self.send(self.request(reqwest::Method::GET, "/health")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn new_trims_trailing_slash() {
        let client = ContractorClient::new("http://localhost:8080/");
        assert_eq!(client.base_url, "http://localhost:8080");
    }

    #[tokio::test]
    async fn health_deserializes_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "ok",
                "version": "0.1.0",
                "timestamp": 1_700_000_000i64,
                "database": "up"
            })))
            .mount(&server)
            .await;

        let client = ContractorClient::new(server.uri());
        let health = client.health().await.unwrap();
        assert_eq!(health.status, "ok");
        assert_eq!(health.database, "up");
    }

    #[tokio::test]
    async fn error_envelope_maps_to_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/teams/00000000-0000-0000-0000-000000000001"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "error": { "code": "NOT_FOUND", "message": "team not found", "details": {} },
                "request_id": "req-1"
            })))
            .mount(&server)
            .await;

        let client = ContractorClient::new(server.uri());
        let id = "00000000-0000-0000-0000-000000000001".parse().unwrap();
        let err = client.get_team(id).await.unwrap_err();
        match err {
            SdkError::Api { status, code, .. } => {
                assert_eq!(status, 404);
                assert_eq!(code, "NOT_FOUND");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn retries_on_server_error_then_succeeds() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/teams"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/v1/teams"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let cfg = RetryConfig { max_retries: 3, initial_delay_ms: 1, max_delay_ms: 5, backoff_multiplier: 1.0 };
        let client = ContractorClient::with_retry_config(server.uri(), cfg);
        let teams = client.list_teams().await.unwrap();
        assert!(teams.is_empty());
    }
}
