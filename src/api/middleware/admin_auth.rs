//! Admin session authentication middleware
//!
//! The panel issues opaque session tokens at login. Requests carry them
//! in `Authorization: Bearer <token>` or the `X-Admin-Token` header.

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::debug;

use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::infrastructure::auth::AdminPrincipal;

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Extractor that requires a valid admin session
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub AdminPrincipal);

impl RequireAdmin {
    /// The session token the request authenticated with
    pub fn token_from(parts: &Parts) -> Option<String> {
        extract_token(parts)
    }
}

fn extract_token(parts: &Parts) -> Option<String> {
    if let Some(value) = parts.headers.get("authorization") {
        if let Ok(value) = value.to_str() {
            if let Some(token) = value.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }

    parts
        .headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(parts).ok_or_else(|| {
            ApiError::unauthorized("Admin session required. Provide a Bearer token.")
        })?;

        let principal = state
            .sessions
            .authenticate(&token)
            .await
            .map_err(ApiError::from)?;

        debug!(username = %principal.username, "Admin access via session token");
        Ok(RequireAdmin(principal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with_header(name: &str, value: &str) -> Parts {
        let (parts, _) = Request::builder()
            .header(name, value)
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    #[test]
    fn test_extract_bearer_token() {
        let parts = parts_with_header("authorization", "Bearer SES_ABC123");
        assert_eq!(extract_token(&parts), Some("SES_ABC123".to_string()));
    }

    #[test]
    fn test_extract_admin_token_header() {
        let parts = parts_with_header("x-admin-token", "SES_ABC123");
        assert_eq!(extract_token(&parts), Some("SES_ABC123".to_string()));
    }

    #[test]
    fn test_missing_token() {
        let (parts, _) = Request::builder().body(()).unwrap().into_parts();
        assert_eq!(extract_token(&parts), None);
    }

    #[test]
    fn test_non_bearer_authorization_ignored() {
        let parts = parts_with_header("authorization", "Basic dXNlcjpwYXNz");
        assert_eq!(extract_token(&parts), None);
    }
}
