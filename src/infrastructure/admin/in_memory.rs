//! In-memory admin account repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::admin::{Admin, AdminRepository};
use crate::domain::DomainError;

/// In-memory implementation of `AdminRepository`
#[derive(Debug, Default)]
pub struct InMemoryAdminRepository {
    admins: Arc<RwLock<HashMap<Uuid, Admin>>>,
}

impl InMemoryAdminRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AdminRepository for InMemoryAdminRepository {
    async fn insert(&self, admin: Admin) -> Result<Admin, DomainError> {
        let mut admins = self.admins.write().await;

        if admins.values().any(|a| a.username() == admin.username()) {
            return Err(DomainError::conflict(format!(
                "admin '{}' already exists",
                admin.username()
            )));
        }

        admins.insert(admin.id(), admin.clone());
        Ok(admin)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Admin>, DomainError> {
        let admins = self.admins.read().await;
        Ok(admins.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Admin>, DomainError> {
        let admins = self.admins.read().await;
        Ok(admins.values().find(|a| a.username() == username).cloned())
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), DomainError> {
        let mut admins = self.admins.write().await;

        match admins.get_mut(&id) {
            Some(admin) => {
                admin.set_password_hash(password_hash);
                Ok(())
            }
            None => Err(DomainError::not_found(format!("admin '{}' not found", id))),
        }
    }

    async fn touch_last_login(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), DomainError> {
        let mut admins = self.admins.write().await;

        match admins.get_mut(&id) {
            Some(admin) => {
                admin.record_login(now);
                Ok(())
            }
            None => Err(DomainError::not_found(format!("admin '{}' not found", id))),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DomainError> {
        let mut admins = self.admins.write().await;
        Ok(admins.remove(&id).is_some())
    }

    async fn list(&self) -> Result<Vec<Admin>, DomainError> {
        let admins = self.admins.read().await;

        let mut result: Vec<Admin> = admins.values().cloned().collect();
        result.sort_by(|a, b| b.created_at().cmp(&a.created_at()));

        Ok(result)
    }

    async fn count(&self) -> Result<i64, DomainError> {
        let admins = self.admins.read().await;
        Ok(admins.len() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_and_find() {
        let repo = InMemoryAdminRepository::new();
        let admin = Admin::new("operator", "hash");

        repo.insert(admin.clone()).await.unwrap();

        let found = repo.find_by_username("operator").await.unwrap();
        assert_eq!(found.unwrap().id(), admin.id());
        assert!(repo.find_by_id(admin.id()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_duplicate_username() {
        let repo = InMemoryAdminRepository::new();

        repo.insert(Admin::new("operator", "hash")).await.unwrap();
        let result = repo.insert(Admin::new("operator", "other")).await;

        assert!(result.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn test_update_password_and_login() {
        let repo = InMemoryAdminRepository::new();
        let admin = Admin::new("operator", "hash");
        repo.insert(admin.clone()).await.unwrap();

        repo.update_password(admin.id(), "new_hash").await.unwrap();
        repo.touch_last_login(admin.id(), Utc::now()).await.unwrap();

        let stored = repo.find_by_id(admin.id()).await.unwrap().unwrap();
        assert_eq!(stored.password_hash(), "new_hash");
        assert!(stored.last_login_at().is_some());
    }

    #[tokio::test]
    async fn test_delete() {
        let repo = InMemoryAdminRepository::new();
        let admin = Admin::new("operator", "hash");
        repo.insert(admin.clone()).await.unwrap();

        assert!(repo.delete(admin.id()).await.unwrap());
        assert!(!repo.delete(admin.id()).await.unwrap());
        assert_eq!(repo.count().await.unwrap(), 0);
    }
}
