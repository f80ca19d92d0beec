//! Public endpoints: health and key validation
//!
//! Validation always answers HTTP 200. Rejections are carried in the
//! body as `{"valid": false, "error": "..."}` so integrating services
//! can distinguish "your key is bad" from "the panel is down".

use axum::extract::{Path, State};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::domain::key::KeyKind;
use crate::infrastructure::key::{KeyProjection, ValidationOutcome};

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: String,
    pub timestamp: String,
}

/// GET /api/health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// GET /api/server/validate/{token}
pub async fn validate_server_key(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let outcome = state
        .key_service
        .validate_kind(&token, KeyKind::Server)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(outcome_to_body(outcome)))
}

/// GET /api/user/validate/{token}
pub async fn validate_user_key(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let outcome = state
        .key_service
        .validate_kind(&token, KeyKind::User)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(outcome_to_body(outcome)))
}

/// GET /api/validate/{token}
///
/// Kind-agnostic validation for callers that hold either flavor.
pub async fn validate_any_key(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let outcome = state
        .key_service
        .validate(&token)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(outcome_to_body(outcome)))
}

fn outcome_to_body(outcome: ValidationOutcome) -> Value {
    match outcome {
        ValidationOutcome::Valid(projection) => json!({
            "valid": true,
            "key": projection_to_body(&projection),
        }),
        ValidationOutcome::Invalid(reason) => {
            debug!(reason = reason.reason(), "validation rejected");
            json!({
                "valid": false,
                "error": reason.message(),
            })
        }
    }
}

/// Field naming differs per kind: server keys carry an "owner" while
/// user keys carry a "user_id" and "device".
fn projection_to_body(projection: &KeyProjection) -> Value {
    let mut body = json!({
        "id": projection.id,
        "kind": projection.kind,
        "usage_count": projection.usage_count,
        "status": projection.status,
    });

    if let Some(limit) = projection.usage_limit {
        body["usage_limit"] = json!(limit);
    }
    if let Some(expires_at) = projection.expires_at {
        body["expires_at"] = json!(expires_at.to_rfc3339());
    }

    match projection.kind {
        KeyKind::Server => {
            if let Some(owner) = &projection.owner {
                body["owner"] = json!(owner);
            }
            if let Some(description) = &projection.description {
                body["description"] = json!(description);
            }
        }
        KeyKind::User => {
            if let Some(owner) = &projection.owner {
                body["user_id"] = json!(owner);
            }
            if let Some(description) = &projection.description {
                body["device"] = json!(description);
            }
        }
    }

    body
}
