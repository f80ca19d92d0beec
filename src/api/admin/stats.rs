//! Aggregate statistics endpoint

use axum::extract::State;

use crate::api::middleware::RequireAdmin;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::domain::key::StoreStats;

/// GET /api/stats
pub async fn get_stats(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<StoreStats>, ApiError> {
    let stats = state.key_service.stats().await.map_err(ApiError::from)?;
    Ok(Json(stats))
}
