//! Admin authentication endpoints

use axum::{
    extract::State,
    http::request::Parts,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::middleware::RequireAdmin;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};

/// Create the authentication router
pub fn create_auth_router() -> Router<AppState> {
    Router::new()
        .route("/admin/login", post(login))
        .route("/admin/logout", post(logout))
        .route("/auth/check", get(check))
}

/// Login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub token: String,
    pub admin: AdminInfo,
}

/// Admin identity attached to auth responses
#[derive(Debug, Serialize)]
pub struct AdminInfo {
    pub username: String,
    pub role: String,
}

/// POST /api/admin/login
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let admin = state
        .admin_service
        .authenticate(&request.username, &request.password)
        .await
        .map_err(ApiError::from)?;

    let token = state.sessions.issue(&admin).await.map_err(ApiError::from)?;

    info!(username = %admin.username(), "admin logged in");

    Ok(Json(LoginResponse {
        success: true,
        token,
        admin: AdminInfo {
            username: admin.username().to_string(),
            role: admin.role().to_string(),
        },
    }))
}

/// Logout response
#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub message: String,
}

/// POST /api/admin/logout
///
/// Revokes the session the request authenticated with.
pub async fn logout(
    State(state): State<AppState>,
    parts: Parts,
    RequireAdmin(principal): RequireAdmin,
) -> Result<Json<LogoutResponse>, ApiError> {
    if let Some(token) = RequireAdmin::token_from(&parts) {
        state.sessions.revoke(&token).await;
    }

    info!(username = %principal.username, "admin logged out");

    Ok(Json(LogoutResponse {
        message: "Logged out successfully".to_string(),
    }))
}

/// Session check response
#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub authenticated: bool,
    pub username: String,
    pub role: String,
}

/// GET /api/auth/check
pub async fn check(RequireAdmin(principal): RequireAdmin) -> Json<CheckResponse> {
    Json(CheckResponse {
        authenticated: true,
        username: principal.username,
        role: principal.role,
    })
}
