//! Bearer-token session management for the admin surface
//!
//! Sessions are opaque tokens held in memory. They do not survive a
//! restart, which forces a fresh login, an acceptable trade for an
//! operator-facing panel.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::admin::Admin;
use crate::domain::DomainError;
use crate::infrastructure::key::TokenGenerator;

const SESSION_TOKEN_PREFIX: &str = "SES";
const SESSION_TTL_HOURS: i64 = 24;

/// The admin identity attached to an authenticated request
#[derive(Debug, Clone)]
pub struct AdminPrincipal {
    pub id: Uuid,
    pub username: String,
    pub role: String,
}

#[derive(Debug, Clone)]
struct Session {
    principal: AdminPrincipal,
    expires_at: DateTime<Utc>,
}

/// In-memory session service
#[derive(Debug, Clone)]
pub struct SessionService {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    generator: TokenGenerator,
    ttl: Duration,
}

impl Default for SessionService {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionService {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            generator: TokenGenerator::new().with_length(32),
            ttl: Duration::hours(SESSION_TTL_HOURS),
        }
    }

    #[cfg(test)]
    fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            generator: TokenGenerator::new().with_length(32),
            ttl,
        }
    }

    /// Open a session for an authenticated admin, returning the token
    pub async fn issue(&self, admin: &Admin) -> Result<String, DomainError> {
        let token = self.generator.generate_with_prefix(SESSION_TOKEN_PREFIX)?;

        let session = Session {
            principal: AdminPrincipal {
                id: admin.id(),
                username: admin.username().to_string(),
                role: admin.role().to_string(),
            },
            expires_at: Utc::now() + self.ttl,
        };

        let mut sessions = self.sessions.write().await;
        sessions.insert(token.clone(), session);

        Ok(token)
    }

    /// Resolve a session token. Expired sessions are evicted on sight.
    pub async fn authenticate(&self, token: &str) -> Result<AdminPrincipal, DomainError> {
        let mut sessions = self.sessions.write().await;

        match sessions.get(token) {
            Some(session) if session.expires_at > Utc::now() => Ok(session.principal.clone()),
            Some(_) => {
                sessions.remove(token);
                Err(DomainError::unauthorized("session expired"))
            }
            None => Err(DomainError::unauthorized("invalid or expired session")),
        }
    }

    /// Close a session. Unknown tokens are ignored.
    pub async fn revoke(&self, token: &str) {
        let mut sessions = self.sessions.write().await;
        sessions.remove(token);
    }

    /// Close every session belonging to an admin, used when the account
    /// is deleted
    pub async fn revoke_all_for(&self, admin_id: Uuid) {
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, session| session.principal.id != admin_id);
    }
}
