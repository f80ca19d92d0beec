use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::admin;
use super::auth;
use super::public;
use super::state::AppState;

/// Create the full router with application state
pub fn create_router_with_state(state: AppState) -> Router {
    let api = Router::new()
        // Public endpoints
        .route("/health", get(public::health_check))
        .route("/server/validate/{token}", get(public::validate_server_key))
        .route("/user/validate/{token}", get(public::validate_user_key))
        .route("/validate/{token}", get(public::validate_any_key))
        // Session endpoints
        .merge(auth::create_auth_router())
        // Admin API (session-protected via extractors)
        .merge(admin::create_admin_router());

    Router::new()
        .nest("/api", api)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
