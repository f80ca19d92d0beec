//! Admin API endpoints for managing keys and accounts

pub mod admins;
pub mod keys;
pub mod stats;

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use super::state::AppState;

/// Create the admin API router
pub fn create_admin_router() -> Router<AppState> {
    Router::new()
        // Key management
        .route("/keys", get(keys::list_keys))
        .route("/keys", post(keys::create_key))
        .route("/keys/batch", post(keys::create_batch))
        .route("/keys/info/{token}", get(keys::get_key_info))
        .route("/keys/{id}", get(keys::get_key))
        .route("/keys/{id}", put(keys::update_key))
        .route("/keys/{id}", delete(keys::delete_key))
        .route("/keys/{id}/reset", post(keys::reset_key))
        .route("/keys/{id}/lock", post(keys::lock_key))
        .route("/keys/{id}/unlock", post(keys::unlock_key))
        .route("/keys/{id}/purge", delete(keys::purge_key))
        // Statistics
        .route("/stats", get(stats::get_stats))
        // Admin accounts
        .route("/admins", get(admins::list_admins))
        .route("/admins", post(admins::create_admin))
        .route("/admins/{id}", delete(admins::delete_admin))
        .route("/admins/{id}/password", put(admins::change_password))
}
