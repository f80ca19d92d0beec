//! Key management admin endpoints

use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::api::middleware::RequireAdmin;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::domain::key::{Key, KeyFilter, KeyKind, KeyStatus, Page};
use crate::infrastructure::key::CreateKeyRequest;

/// Request to create a key
#[derive(Debug, Clone, Deserialize)]
pub struct CreateKeyBody {
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub usage_limit: Option<i64>,
    #[serde(default)]
    pub expires_in_days: Option<i64>,
    #[serde(default)]
    pub prefix: Option<String>,
}

impl CreateKeyBody {
    fn into_request(self) -> Result<CreateKeyRequest, ApiError> {
        let kind = match self.kind.as_deref() {
            None => KeyKind::default(),
            Some(s) => KeyKind::parse(s)
                .ok_or_else(|| ApiError::bad_request(format!("unknown key kind '{}'", s)))?,
        };

        Ok(CreateKeyRequest {
            kind,
            owner: self.owner,
            description: self.description,
            usage_limit: self.usage_limit,
            expires_in_days: self.expires_in_days,
            prefix: self.prefix,
        })
    }
}

/// Request to create several keys at once
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBatchBody {
    pub count: i64,
    #[serde(flatten)]
    pub key: CreateKeyBody,
}

/// Request to update key metadata
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateKeyBody {
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Key response; the token is reduced to a preview
#[derive(Debug, Clone, Serialize)]
pub struct KeyResponse {
    pub id: Uuid,
    pub token_preview: String,
    pub kind: KeyKind,
    pub owner: Option<String>,
    pub description: Option<String>,
    pub status: KeyStatus,
    pub created_at: String,
    pub updated_at: String,
    pub expires_at: Option<String>,
    pub last_used_at: Option<String>,
    pub usage_count: i64,
    pub usage_limit: Option<i64>,
}

impl From<&Key> for KeyResponse {
    fn from(key: &Key) -> Self {
        Self {
            id: key.id(),
            token_preview: token_preview(key.token()),
            kind: key.kind(),
            owner: key.owner().map(String::from),
            description: key.description().map(String::from),
            status: key.status(),
            created_at: key.created_at().to_rfc3339(),
            updated_at: key.updated_at().to_rfc3339(),
            expires_at: key.expires_at().map(|dt| dt.to_rfc3339()),
            last_used_at: key.last_used_at().map(|dt| dt.to_rfc3339()),
            usage_count: key.usage_count(),
            usage_limit: key.usage_limit(),
        }
    }
}

/// Key response with the full token, only returned at creation
#[derive(Debug, Clone, Serialize)]
pub struct CreatedKeyResponse {
    #[serde(flatten)]
    pub key: KeyResponse,
    pub token: String,
}

/// List response
#[derive(Debug, Clone, Serialize)]
pub struct ListKeysResponse {
    pub keys: Vec<KeyResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Batch creation response
#[derive(Debug, Clone, Serialize)]
pub struct CreatedBatchResponse {
    pub keys: Vec<CreatedKeyResponse>,
    pub count: usize,
}

/// Filter/pagination query parameters for listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListKeysQuery {
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

impl ListKeysQuery {
    fn into_filter(self) -> Result<(KeyFilter, Page), ApiError> {
        let kind = match self.kind.as_deref() {
            None => None,
            Some(s) => Some(
                KeyKind::parse(s)
                    .ok_or_else(|| ApiError::bad_request(format!("unknown key kind '{}'", s)))?,
            ),
        };

        let status = match self.status.as_deref() {
            None => None,
            Some(s) => Some(parse_status(s)?),
        };

        let filter = KeyFilter {
            kind,
            status,
            search: self.search.filter(|s| !s.trim().is_empty()),
        };

        Ok((filter, Page::new(self.limit, self.offset)))
    }
}

fn parse_status(s: &str) -> Result<KeyStatus, ApiError> {
    match s {
        "active" => Ok(KeyStatus::Active),
        "locked" => Ok(KeyStatus::Locked),
        "expired" => Ok(KeyStatus::Expired),
        "deleted" => Ok(KeyStatus::Deleted),
        other => Err(ApiError::bad_request(format!(
            "unknown key status '{}'",
            other
        ))),
    }
}

/// Shorten a token for list/detail views. Only the prefix and the first
/// few random characters survive.
fn token_preview(token: &str) -> String {
    let head: String = token.chars().take(8).collect();
    format!("{}...", head)
}

/// GET /api/keys
pub async fn list_keys(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Query(query): Query<ListKeysQuery>,
) -> Result<Json<ListKeysResponse>, ApiError> {
    let (filter, page) = query.into_filter()?;

    let keys = state
        .key_service
        .list(&filter, page)
        .await
        .map_err(ApiError::from)?;
    let total = state.key_service.count(&filter).await.map_err(ApiError::from)?;

    Ok(Json(ListKeysResponse {
        keys: keys.iter().map(KeyResponse::from).collect(),
        total,
        limit: page.limit,
        offset: page.offset,
    }))
}

/// POST /api/keys
pub async fn create_key(
    State(state): State<AppState>,
    RequireAdmin(principal): RequireAdmin,
    Json(body): Json<CreateKeyBody>,
) -> Result<Json<CreatedKeyResponse>, ApiError> {
    debug!(username = %principal.username, "admin creating key");

    let request = body.into_request()?;
    let created = state.key_service.create(request).await.map_err(ApiError::from)?;

    Ok(Json(CreatedKeyResponse {
        key: KeyResponse::from(&created.key),
        token: created.token,
    }))
}

/// POST /api/keys/batch
pub async fn create_batch(
    State(state): State<AppState>,
    RequireAdmin(principal): RequireAdmin,
    Json(body): Json<CreateBatchBody>,
) -> Result<Json<CreatedBatchResponse>, ApiError> {
    debug!(username = %principal.username, count = body.count, "admin creating key batch");

    let request = body.key.into_request()?;
    let created = state
        .key_service
        .create_batch(request, body.count)
        .await
        .map_err(ApiError::from)?;

    let keys: Vec<CreatedKeyResponse> = created
        .into_iter()
        .map(|c| CreatedKeyResponse {
            key: KeyResponse::from(&c.key),
            token: c.token,
        })
        .collect();
    let count = keys.len();

    Ok(Json(CreatedBatchResponse { keys, count }))
}

/// GET /api/keys/{id}
pub async fn get_key(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<Uuid>,
) -> Result<Json<KeyResponse>, ApiError> {
    let key = state.key_service.get(id).await.map_err(ApiError::from)?;
    Ok(Json(KeyResponse::from(&key)))
}

/// GET /api/keys/info/{token}
///
/// Inspect a key by its full token without counting a use.
pub async fn get_key_info(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(token): Path<String>,
) -> Result<Json<KeyResponse>, ApiError> {
    let key = state
        .key_service
        .get_by_token(&token)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(KeyResponse::from(&key)))
}

/// PUT /api/keys/{id}
pub async fn update_key(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateKeyBody>,
) -> Result<Json<KeyResponse>, ApiError> {
    let key = state
        .key_service
        .update_metadata(id, body.owner, body.description)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(KeyResponse::from(&key)))
}

/// POST /api/keys/{id}/reset
pub async fn reset_key(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<Uuid>,
) -> Result<Json<KeyResponse>, ApiError> {
    let key = state.key_service.reset(id).await.map_err(ApiError::from)?;
    Ok(Json(KeyResponse::from(&key)))
}

/// POST /api/keys/{id}/lock
pub async fn lock_key(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<Uuid>,
) -> Result<Json<KeyResponse>, ApiError> {
    let key = state.key_service.lock(id).await.map_err(ApiError::from)?;
    Ok(Json(KeyResponse::from(&key)))
}

/// POST /api/keys/{id}/unlock
pub async fn unlock_key(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<Uuid>,
) -> Result<Json<KeyResponse>, ApiError> {
    let key = state.key_service.unlock(id).await.map_err(ApiError::from)?;
    Ok(Json(KeyResponse::from(&key)))
}

/// DELETE /api/keys/{id}
///
/// Soft delete; the record survives and can be reset back to active.
pub async fn delete_key(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<Uuid>,
) -> Result<Json<KeyResponse>, ApiError> {
    let key = state.key_service.soft_delete(id).await.map_err(ApiError::from)?;
    Ok(Json(KeyResponse::from(&key)))
}

/// Purge response
#[derive(Debug, Serialize)]
pub struct PurgeResponse {
    pub deleted: bool,
}

/// DELETE /api/keys/{id}/purge
///
/// Removes the record entirely. The token is retired and will never be
/// issued again.
pub async fn purge_key(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<Uuid>,
) -> Result<Json<PurgeResponse>, ApiError> {
    state.key_service.hard_delete(id).await.map_err(ApiError::from)?;
    Ok(Json(PurgeResponse { deleted: true }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_preview() {
        assert_eq!(token_preview("SRV_ABCDEFGHIJKLMNOPQRST"), "SRV_ABCD...");
        assert_eq!(token_preview("USR"), "USR...");
    }

    #[test]
    fn test_create_body_kind_parsing() {
        let body = CreateKeyBody {
            kind: Some("user".to_string()),
            owner: None,
            description: None,
            usage_limit: None,
            expires_in_days: None,
            prefix: None,
        };
        assert_eq!(body.into_request().unwrap().kind, KeyKind::User);

        let bad = CreateKeyBody {
            kind: Some("nonsense".to_string()),
            owner: None,
            description: None,
            usage_limit: None,
            expires_in_days: None,
            prefix: None,
        };
        assert!(bad.into_request().is_err());
    }

    #[test]
    fn test_list_query_parsing() {
        let query = ListKeysQuery {
            kind: Some("server".to_string()),
            status: Some("locked".to_string()),
            search: Some("  ".to_string()),
            limit: Some(20),
            offset: Some(5),
        };

        let (filter, page) = query.into_filter().unwrap();
        assert_eq!(filter.kind, Some(KeyKind::Server));
        assert_eq!(filter.status, Some(KeyStatus::Locked));
        assert!(filter.search.is_none());
        assert_eq!(page.limit, 20);
        assert_eq!(page.offset, 5);
    }

    #[test]
    fn test_list_query_rejects_unknown_status() {
        let query = ListKeysQuery {
            status: Some("broken".to_string()),
            ..Default::default()
        };
        assert!(query.into_filter().is_err());
    }
}
