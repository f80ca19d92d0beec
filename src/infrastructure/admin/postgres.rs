//! PostgreSQL admin account repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::admin::{Admin, AdminRepository};
use crate::domain::DomainError;

/// PostgreSQL implementation of `AdminRepository`
#[derive(Debug, Clone)]
pub struct PostgresAdminRepository {
    pool: PgPool,
}

impl PostgresAdminRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the admins table if needed
    pub async fn init_schema(&self) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS admins (
                id UUID PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'admin',
                created_at TIMESTAMPTZ NOT NULL,
                last_login_at TIMESTAMPTZ
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to init admins schema: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl AdminRepository for PostgresAdminRepository {
    async fn insert(&self, admin: Admin) -> Result<Admin, DomainError> {
        sqlx::query(
            r#"
            INSERT INTO admins (id, username, password_hash, role, created_at, last_login_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(admin.id())
        .bind(admin.username())
        .bind(admin.password_hash())
        .bind(admin.role())
        .bind(admin.created_at())
        .bind(admin.last_login_at())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let msg = e.to_string();

            if msg.contains("duplicate key") || msg.contains("unique constraint") {
                DomainError::conflict(format!("admin '{}' already exists", admin.username()))
            } else {
                DomainError::storage(format!("Failed to insert admin: {}", e))
            }
        })?;

        Ok(admin)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Admin>, DomainError> {
        let row = sqlx::query(
            "SELECT id, username, password_hash, role, created_at, last_login_at \
             FROM admins WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to get admin: {}", e)))?;

        row.map(|r| row_to_admin(&r)).transpose()
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Admin>, DomainError> {
        let row = sqlx::query(
            "SELECT id, username, password_hash, role, created_at, last_login_at \
             FROM admins WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to get admin by username: {}", e)))?;

        row.map(|r| row_to_admin(&r)).transpose()
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), DomainError> {
        let result = sqlx::query("UPDATE admins SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to update password: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(format!("admin '{}' not found", id)));
        }

        Ok(())
    }

    async fn touch_last_login(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), DomainError> {
        let result = sqlx::query("UPDATE admins SET last_login_at = $2 WHERE id = $1")
            .bind(id)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to record login: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(format!("admin '{}' not found", id)));
        }

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM admins WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to delete admin: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self) -> Result<Vec<Admin>, DomainError> {
        let rows = sqlx::query(
            "SELECT id, username, password_hash, role, created_at, last_login_at \
             FROM admins ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to list admins: {}", e)))?;

        let mut admins = Vec::with_capacity(rows.len());
        for row in rows {
            admins.push(row_to_admin(&row)?);
        }

        Ok(admins)
    }

    async fn count(&self) -> Result<i64, DomainError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM admins")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to count admins: {}", e)))?;

        Ok(count)
    }
}

fn row_to_admin(row: &PgRow) -> Result<Admin, DomainError> {
    let map_err = |e: sqlx::Error| DomainError::storage(format!("Invalid admin row: {}", e));

    Ok(Admin::from_stored(
        row.try_get("id").map_err(map_err)?,
        row.try_get("username").map_err(map_err)?,
        row.try_get("password_hash").map_err(map_err)?,
        row.try_get("role").map_err(map_err)?,
        row.try_get("created_at").map_err(map_err)?,
        row.try_get("last_login_at").unwrap_or(None),
    ))
}
