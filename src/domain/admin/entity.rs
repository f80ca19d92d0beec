//! Admin account entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Username of the root admin account that cannot be deleted
pub const ROOT_ADMIN_USERNAME: &str = "admin";

/// Admin account for the panel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Admin {
    id: Uuid,
    username: String,
    /// Argon2 hash, never exposed in API responses
    password_hash: String,
    role: String,
    created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_login_at: Option<DateTime<Utc>>,
}

impl Admin {
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            password_hash: password_hash.into(),
            role: "admin".to_string(),
            created_at: Utc::now(),
            last_login_at: None,
        }
    }

    pub fn from_stored(
        id: Uuid,
        username: String,
        password_hash: String,
        role: String,
        created_at: DateTime<Utc>,
        last_login_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            username,
            password_hash,
            role,
            created_at,
            last_login_at,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_login_at(&self) -> Option<DateTime<Utc>> {
        self.last_login_at
    }

    /// Whether this is the protected root account
    pub fn is_root(&self) -> bool {
        self.username == ROOT_ADMIN_USERNAME
    }

    pub fn set_password_hash(&mut self, hash: impl Into<String>) {
        self.password_hash = hash.into();
    }

    pub fn record_login(&mut self, now: DateTime<Utc>) {
        self.last_login_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_admin() {
        let admin = Admin::new("ops", "hash");
        assert_eq!(admin.username(), "ops");
        assert_eq!(admin.role(), "admin");
        assert!(admin.last_login_at().is_none());
        assert!(!admin.is_root());
    }

    #[test]
    fn test_root_detection() {
        assert!(Admin::new("admin", "hash").is_root());
        assert!(!Admin::new("administrator", "hash").is_root());
    }

    #[test]
    fn test_record_login() {
        let mut admin = Admin::new("ops", "hash");
        let now = Utc::now();
        admin.record_login(now);
        assert_eq!(admin.last_login_at(), Some(now));
    }
}
