//! API routes

pub mod api_keys;
pub mod assets;
pub mod audit;
pub mod health;
pub mod proposals;
pub mod registrations;
pub mod teams;

use std::sync::Arc;

use axum::routing::{delete, get, patch, post};
use axum::Router;
use contractor_core::entities::ApiScope;

use crate::middleware::AuthLayer;
use crate::state::AppState;

/// Build the full router: `/health` unauthenticated, everything else under
/// `/api/v1` behind a scoped API key.
pub fn create_router(state: Arc<AppState>) -> Router {
    let read = Router::new()
        .route("/teams", get(teams::list_teams))
        .route("/teams/:id", get(teams::get_team))
        .route("/assets", get(assets::list_assets))
        .route("/assets/:id", get(assets::get_asset))
        .route("/assets/:id/contracts", get(assets::list_contracts))
        .route("/contracts/:id", get(assets::get_contract))
        .route("/assets/:id/compare", post(assets::compare))
        .route("/assets/:id/impact", get(assets::get_impact))
        .route("/registrations", get(registrations::list_registrations_for_consumer))
        .route("/proposals", get(proposals::list_proposals))
        .route("/proposals/:id", get(proposals::get_proposal))
        .route("/api-keys", get(api_keys::list_api_keys))
        .route("/audit", get(audit::query_audit))
        .route_layer(AuthLayer::new(state.clone(), ApiScope::Read));

    let write = Router::new()
        .route("/teams", post(teams::create_team))
        .route("/teams/:id", delete(teams::delete_team))
        .route("/assets", post(assets::create_asset))
        .route("/assets/:id", delete(assets::delete_asset))
        .route("/assets/:id/contracts", post(assets::publish_contract))
        .route("/registrations", post(registrations::create_registration))
        .route("/registrations/:id", patch(registrations::update_registration))
        .route("/proposals/:id/acknowledge", post(proposals::acknowledge))
        .route("/proposals/:id/withdraw", post(proposals::withdraw))
        .route("/proposals/:id/force", post(proposals::force))
        .route("/proposals/:id/publish", post(proposals::publish))
        .route_layer(AuthLayer::new(state.clone(), ApiScope::Write));

    let admin = Router::new()
        .route("/api-keys", post(api_keys::create_api_key))
        .route("/api-keys/:id", delete(api_keys::revoke_api_key))
        .route_layer(AuthLayer::new(state.clone(), ApiScope::Admin));

    Router::new()
        .route("/health", get(health::health))
        .nest(
            "/api/v1",
            read.merge(write).merge(admin),
        )
        .with_state(state)
}
