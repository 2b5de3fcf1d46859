//! Scoped API-key authentication.
//!
//! Mirrors the `Layer`/`Service` shape of [`crate::middleware::rate_limit`]:
//! a cheap `Clone`-able layer holding shared state, wrapping an inner
//! service in a stateful service. Unlike the rate limiter the check needs
//! the database, so `call` does its work inside the returned future rather
//! than synchronously.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::extract::Request;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use contractor_core::entities::ApiScope;
use serde_json::json;
use sha2::{Digest, Sha256};
use tower::{Layer, Service};

use crate::state::AppState;

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": { "code": "UNAUTHORIZED", "message": message, "details": {} } })),
    )
        .into_response()
}

fn forbidden(message: &str) -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(json!({ "error": { "code": "FORBIDDEN", "message": message, "details": {} } })),
    )
        .into_response()
}

pub fn hash_key(raw: &str) -> String {
    Sha256::digest(raw.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// A fresh plaintext API key. Two concatenated v4 UUIDs give 256 bits of
/// randomness without pulling in a dedicated CSPRNG crate.
pub fn generate_key() -> String {
    format!(
        "ctr_{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}

/// Requires a valid, non-revoked API key satisfying `required_scope`.
#[derive(Clone)]
pub struct AuthLayer {
    state: Arc<AppState>,
    required_scope: ApiScope,
}

impl AuthLayer {
    pub fn new(state: Arc<AppState>, required_scope: ApiScope) -> Self {
        Self { state, required_scope }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            state: self.state.clone(),
            required_scope: self.required_scope,
        }
    }
}

#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    state: Arc<AppState>,
    required_scope: ApiScope,
}

impl<S> Service<Request> for AuthService<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future =
        std::pin::Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let mut inner = self.inner.clone();
        let state = self.state.clone();
        let required_scope = self.required_scope;

        let token = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_string);

        Box::pin(async move {
            let Some(token) = token else {
                return Ok(unauthorized("missing bearer token"));
            };

            let key_hash = hash_key(&token);
            let key = match state.repo.get_api_key_by_hash(&key_hash).await {
                Ok(key) => key,
                Err(e) => {
                    tracing::error!(error = %e, "api key lookup failed");
                    return Ok(unauthorized("invalid API key"));
                }
            };

            match key {
                Some(key) if key.is_revoked() => Ok(unauthorized("API key revoked")),
                Some(key) if !key.scope.satisfies(required_scope) => {
                    Ok(forbidden("API key scope insufficient for this operation"))
                }
                Some(_) => inner.call(req).await,
                None => Ok(unauthorized("invalid API key")),
            }
        })
    }
}
