//! Admin account repository trait

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Debug;
use uuid::Uuid;

use super::entity::Admin;
use crate::domain::DomainError;

/// Repository for admin accounts
#[async_trait]
pub trait AdminRepository: Send + Sync + Debug {
    /// Insert a new admin; fails with `Conflict` on duplicate username
    async fn insert(&self, admin: Admin) -> Result<Admin, DomainError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Admin>, DomainError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<Admin>, DomainError>;

    /// Replace the stored password hash
    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), DomainError>;

    /// Record a successful login
    async fn touch_last_login(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), DomainError>;

    /// Remove an admin account; returns whether a record was removed
    async fn delete(&self, id: Uuid) -> Result<bool, DomainError>;

    /// All admins, newest first
    async fn list(&self) -> Result<Vec<Admin>, DomainError>;

    async fn count(&self) -> Result<i64, DomainError>;
}
