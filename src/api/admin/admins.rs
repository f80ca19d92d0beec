//! Admin account management endpoints

use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::api::middleware::RequireAdmin;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::domain::admin::Admin;

/// Request to create an admin account
#[derive(Debug, Deserialize)]
pub struct CreateAdminBody {
    pub username: String,
    pub password: String,
}

/// Request to change a password
#[derive(Debug, Deserialize)]
pub struct ChangePasswordBody {
    pub current_password: String,
    pub new_password: String,
}

/// Admin account response; the hash never leaves the service
#[derive(Debug, Serialize)]
pub struct AdminResponse {
    pub id: Uuid,
    pub username: String,
    pub role: String,
    pub created_at: String,
    pub last_login_at: Option<String>,
}

impl From<&Admin> for AdminResponse {
    fn from(admin: &Admin) -> Self {
        Self {
            id: admin.id(),
            username: admin.username().to_string(),
            role: admin.role().to_string(),
            created_at: admin.created_at().to_rfc3339(),
            last_login_at: admin.last_login_at().map(|dt| dt.to_rfc3339()),
        }
    }
}

/// List response
#[derive(Debug, Serialize)]
pub struct ListAdminsResponse {
    pub admins: Vec<AdminResponse>,
    pub total: usize,
}

/// GET /api/admins
pub async fn list_admins(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<ListAdminsResponse>, ApiError> {
    let admins = state.admin_service.list().await.map_err(ApiError::from)?;

    let responses: Vec<AdminResponse> = admins.iter().map(AdminResponse::from).collect();
    let total = responses.len();

    Ok(Json(ListAdminsResponse {
        admins: responses,
        total,
    }))
}

/// POST /api/admins
pub async fn create_admin(
    State(state): State<AppState>,
    RequireAdmin(principal): RequireAdmin,
    Json(body): Json<CreateAdminBody>,
) -> Result<Json<AdminResponse>, ApiError> {
    debug!(by = %principal.username, username = %body.username, "creating admin account");

    let admin = state
        .admin_service
        .create(&body.username, &body.password)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(AdminResponse::from(&admin)))
}

/// PUT /api/admins/{id}/password
///
/// Admins may only change their own password.
pub async fn change_password(
    State(state): State<AppState>,
    RequireAdmin(principal): RequireAdmin,
    Path(id): Path<Uuid>,
    Json(body): Json<ChangePasswordBody>,
) -> Result<Json<AdminResponse>, ApiError> {
    if principal.id != id {
        return Err(ApiError::forbidden(
            "you can only change your own password",
        ));
    }

    state
        .admin_service
        .change_password(id, &body.current_password, &body.new_password)
        .await
        .map_err(ApiError::from)?;

    let admin = state.admin_service.get(id).await.map_err(ApiError::from)?;
    Ok(Json(AdminResponse::from(&admin)))
}

/// Deletion response
#[derive(Debug, Serialize)]
pub struct DeleteAdminResponse {
    pub deleted: bool,
}

/// DELETE /api/admins/{id}
pub async fn delete_admin(
    State(state): State<AppState>,
    RequireAdmin(principal): RequireAdmin,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteAdminResponse>, ApiError> {
    if principal.id == id {
        return Err(ApiError::bad_request("you cannot delete your own account"));
    }

    state.admin_service.delete(id).await.map_err(ApiError::from)?;
    state.sessions.revoke_all_for(id).await;

    Ok(Json(DeleteAdminResponse { deleted: true }))
}
