//! Admin account service

use chrono::Utc;
use rand::rngs::OsRng;
use rand::RngCore;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::admin::{Admin, AdminRepository, ROOT_ADMIN_USERNAME};
use crate::domain::DomainError;
use crate::infrastructure::admin::PasswordHasher;

const MIN_USERNAME_LENGTH: usize = 3;
const MIN_PASSWORD_LENGTH: usize = 8;

/// Env var overriding the bootstrap password for the root account
const DEFAULT_PASSWORD_ENV: &str = "ADMIN_DEFAULT_PASSWORD";

/// Admin account service
#[derive(Debug, Clone)]
pub struct AdminService {
    repository: Arc<dyn AdminRepository>,
    hasher: Arc<dyn PasswordHasher>,
}

impl AdminService {
    pub fn new(repository: Arc<dyn AdminRepository>, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self { repository, hasher }
    }

    /// Create an admin account
    pub async fn create(&self, username: &str, password: &str) -> Result<Admin, DomainError> {
        let username = username.trim();

        if username.len() < MIN_USERNAME_LENGTH {
            return Err(DomainError::validation(format!(
                "username must be at least {} characters",
                MIN_USERNAME_LENGTH
            )));
        }
        if !username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(DomainError::validation(
                "username may only contain letters, digits, '_' and '-'",
            ));
        }
        if password.len() < MIN_PASSWORD_LENGTH {
            return Err(DomainError::validation(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }

        let hash = self.hasher.hash(password)?;
        let admin = self.repository.insert(Admin::new(username, hash)).await?;
        info!(username = %admin.username(), "admin account created");
        Ok(admin)
    }

    /// Check credentials. Failures are indistinguishable to the caller.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Admin, DomainError> {
        let admin = self
            .repository
            .find_by_username(username)
            .await?
            .ok_or_else(|| DomainError::unauthorized("invalid username or password"))?;

        if !self.hasher.verify(password, admin.password_hash()) {
            return Err(DomainError::unauthorized("invalid username or password"));
        }

        self.repository
            .touch_last_login(admin.id(), Utc::now())
            .await?;

        Ok(admin)
    }

    /// Change an account's password after checking the current one
    pub async fn change_password(
        &self,
        id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), DomainError> {
        let admin = self
            .repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("admin '{}' not found", id)))?;

        if !self.hasher.verify(current_password, admin.password_hash()) {
            return Err(DomainError::unauthorized("current password is incorrect"));
        }
        if new_password.len() < MIN_PASSWORD_LENGTH {
            return Err(DomainError::validation(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }

        let hash = self.hasher.hash(new_password)?;
        self.repository.update_password(id, &hash).await?;
        info!(username = %admin.username(), "admin password changed");
        Ok(())
    }

    /// Delete an account. The root account is protected.
    pub async fn delete(&self, id: Uuid) -> Result<(), DomainError> {
        let admin = self
            .repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("admin '{}' not found", id)))?;

        if admin.is_root() {
            return Err(DomainError::validation(
                "the root admin account cannot be deleted",
            ));
        }

        self.repository.delete(id).await?;
        info!(username = %admin.username(), "admin account deleted");
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<Admin, DomainError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("admin '{}' not found", id)))
    }

    pub async fn list(&self) -> Result<Vec<Admin>, DomainError> {
        self.repository.list().await
    }

    pub async fn count(&self) -> Result<i64, DomainError> {
        self.repository.count().await
    }

    /// Create the root account on first boot.
    ///
    /// The password comes from `ADMIN_DEFAULT_PASSWORD` when set, otherwise
    /// a random one is generated and logged exactly once.
    pub async fn ensure_default_admin(&self) -> Result<(), DomainError> {
        if self
            .repository
            .find_by_username(ROOT_ADMIN_USERNAME)
            .await?
            .is_some()
        {
            return Ok(());
        }

        let (password, generated) = match std::env::var(DEFAULT_PASSWORD_ENV) {
            Ok(password) if !password.is_empty() => (password, false),
            _ => (generate_password()?, true),
        };

        let hash = self.hasher.hash(&password)?;
        self.repository
            .insert(Admin::new(ROOT_ADMIN_USERNAME, hash))
            .await?;

        if generated {
            // Shown once at boot; there is no other way to recover it
            warn!(
                username = ROOT_ADMIN_USERNAME,
                password = %password,
                "created default admin account with a generated password"
            );
        } else {
            info!(username = ROOT_ADMIN_USERNAME, "created default admin account");
        }

        Ok(())
    }
}

fn generate_password() -> Result<String, DomainError> {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| DomainError::entropy(format!("OS entropy source unavailable: {}", e)))?;

    // 62 does not divide 256 evenly but password bias is not a concern here
    Ok(bytes
        .iter()
        .take(16)
        .map(|b| CHARSET[(*b as usize) % CHARSET.len()] as char)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::admin::{Argon2Hasher, InMemoryAdminRepository};

    fn service() -> AdminService {
        AdminService::new(
            Arc::new(InMemoryAdminRepository::new()),
            Arc::new(Argon2Hasher::new()),
        )
    }

    #[tokio::test]
    async fn test_create_and_authenticate() {
        let service = service();

        let created = service.create("operator", "password123").await.unwrap();
        assert_eq!(created.username(), "operator");

        let authenticated = service.authenticate("operator", "password123").await.unwrap();
        assert_eq!(authenticated.id(), created.id());
        // last_login_at was recorded
        let stored = service.get(created.id()).await.unwrap();
        assert!(stored.last_login_at().is_some());
    }

    #[tokio::test]
    async fn test_create_validation() {
        let service = service();

        assert!(service.create("ab", "password123").await.is_err());
        assert!(service.create("operator", "short").await.is_err());
        assert!(service.create("bad name!", "password123").await.is_err());
    }

    #[tokio::test]
    async fn test_authenticate_failures_are_uniform() {
        let service = service();
        service.create("operator", "password123").await.unwrap();

        let wrong_password = service
            .authenticate("operator", "wrong")
            .await
            .unwrap_err();
        let unknown_user = service
            .authenticate("nobody", "password123")
            .await
            .unwrap_err();

        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
    }

    #[tokio::test]
    async fn test_change_password() {
        let service = service();
        let admin = service.create("operator", "password123").await.unwrap();

        service
            .change_password(admin.id(), "password123", "newpassword")
            .await
            .unwrap();

        assert!(service.authenticate("operator", "password123").await.is_err());
        assert!(service.authenticate("operator", "newpassword").await.is_ok());
    }

    #[tokio::test]
    async fn test_change_password_requires_current() {
        let service = service();
        let admin = service.create("operator", "password123").await.unwrap();

        let result = service
            .change_password(admin.id(), "wrong", "newpassword")
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_root_admin_is_protected() {
        let service = service();
        let root = service.create("admin", "password123").await.unwrap();
        let other = service.create("operator", "password123").await.unwrap();

        assert!(service.delete(root.id()).await.is_err());
        service.delete(other.id()).await.unwrap();
        assert_eq!(service.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_ensure_default_admin_is_idempotent() {
        let service = service();

        service.ensure_default_admin().await.unwrap();
        service.ensure_default_admin().await.unwrap();

        assert_eq!(service.count().await.unwrap(), 1);
        let admins = service.list().await.unwrap();
        assert_eq!(admins[0].username(), ROOT_ADMIN_USERNAME);
    }
}
