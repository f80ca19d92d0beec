//! PostgreSQL key store implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{QueryBuilder, Row};
use tracing::warn;
use uuid::Uuid;

use crate::domain::key::{
    Key, KeyFilter, KeyKind, KeyStatus, KeyStore, Page, RecentUse, StoreStats,
};
use crate::domain::DomainError;

const SELECT_COLUMNS: &str = "id, token, kind, owner, description, status, \
     created_at, updated_at, expires_at, last_used_at, usage_count, usage_limit";

/// PostgreSQL implementation of `KeyStore`
#[derive(Debug, Clone)]
pub struct PostgresKeyStore {
    pool: PgPool,
}

impl PostgresKeyStore {
    /// Create a new store with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to the database and ensure the schema exists
    pub async fn connect(url: &str) -> Result<Self, DomainError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect(url)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to connect to PostgreSQL: {}", e)))?;

        let store = Self::new(pool);
        store.init_schema().await?;
        Ok(store)
    }

    /// Underlying connection pool, shared with other repositories
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the tables and indexes used by the store
    pub async fn init_schema(&self) -> Result<(), DomainError> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS keys (
                id UUID PRIMARY KEY,
                token TEXT NOT NULL UNIQUE,
                kind TEXT NOT NULL,
                owner TEXT,
                description TEXT,
                status TEXT NOT NULL DEFAULT 'active',
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                expires_at TIMESTAMPTZ,
                last_used_at TIMESTAMPTZ,
                usage_count BIGINT NOT NULL DEFAULT 0,
                usage_limit BIGINT
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_keys_status ON keys (status)",
            "CREATE INDEX IF NOT EXISTS idx_keys_expires_at ON keys (expires_at)",
            r#"
            CREATE TABLE IF NOT EXISTS key_actions (
                id BIGSERIAL PRIMARY KEY,
                key_id UUID NOT NULL,
                action TEXT NOT NULL,
                details TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            // Tokens of purged keys, kept so they are never issued again
            r#"
            CREATE TABLE IF NOT EXISTS retired_tokens (
                token TEXT PRIMARY KEY,
                retired_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| DomainError::storage(format!("Failed to init schema: {}", e)))?;
        }

        Ok(())
    }

    fn push_filter(builder: &mut QueryBuilder<'_, sqlx::Postgres>, filter: &KeyFilter) {
        builder.push(" WHERE 1 = 1");

        if let Some(kind) = filter.kind {
            builder.push(" AND kind = ").push_bind(kind.as_str());
        }
        if let Some(status) = filter.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(search) = &filter.search {
            let pattern = format!("%{}%", search);
            builder
                .push(" AND (token ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR owner ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
    }
}

#[async_trait]
impl KeyStore for PostgresKeyStore {
    async fn insert(&self, key: Key) -> Result<Key, DomainError> {
        let retired: Option<String> =
            sqlx::query_scalar("SELECT token FROM retired_tokens WHERE token = $1")
                .bind(key.token())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| DomainError::storage(format!("Failed to check token: {}", e)))?;

        if retired.is_some() {
            return Err(DomainError::conflict(format!(
                "key with token '{}' already exists",
                key.token()
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO keys (id, token, kind, owner, description, status,
                              created_at, updated_at, expires_at, last_used_at,
                              usage_count, usage_limit)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(key.id())
        .bind(key.token())
        .bind(key.kind().as_str())
        .bind(key.owner())
        .bind(key.description())
        .bind(key.status().as_str())
        .bind(key.created_at())
        .bind(key.updated_at())
        .bind(key.expires_at())
        .bind(key.last_used_at())
        .bind(key.usage_count())
        .bind(key.usage_limit())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let msg = e.to_string();

            if msg.contains("duplicate key") || msg.contains("unique constraint") {
                DomainError::conflict(format!("key with token '{}' already exists", key.token()))
            } else {
                DomainError::storage(format!("Failed to insert key: {}", e))
            }
        })?;

        Ok(key)
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<Key>, DomainError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM keys WHERE token = $1"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to get key by token: {}", e)))?;

        row.map(|r| row_to_key(&r)).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Key>, DomainError> {
        let row = sqlx::query(&format!("SELECT {SELECT_COLUMNS} FROM keys WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to get key: {}", e)))?;

        row.map(|r| row_to_key(&r)).transpose()
    }

    async fn update(&self, key: &Key) -> Result<Key, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE keys
            SET owner = $2, description = $3, status = $4, updated_at = $5,
                expires_at = $6, last_used_at = $7, usage_count = $8, usage_limit = $9
            WHERE id = $1
            "#,
        )
        .bind(key.id())
        .bind(key.owner())
        .bind(key.description())
        .bind(key.status().as_str())
        .bind(key.updated_at())
        .bind(key.expires_at())
        .bind(key.last_used_at())
        .bind(key.usage_count())
        .bind(key.usage_limit())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to update key: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(format!(
                "key '{}' not found",
                key.id()
            )));
        }

        Ok(key.clone())
    }

    async fn record_use(&self, id: Uuid, now: DateTime<Utc>) -> Result<Key, DomainError> {
        // Single statement so concurrent validations never lose an increment
        let row = sqlx::query(&format!(
            r#"
            UPDATE keys
            SET usage_count = usage_count + 1, last_used_at = $2, updated_at = $2
            WHERE id = $1
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to record use: {}", e)))?;

        match row {
            Some(row) => row_to_key(&row),
            None => Err(DomainError::not_found(format!("key '{}' not found", id))),
        }
    }

    async fn set_status(&self, id: Uuid, status: KeyStatus) -> Result<Key, DomainError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE keys
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to set key status: {}", e)))?;

        match row {
            Some(row) => row_to_key(&row),
            None => Err(DomainError::not_found(format!("key '{}' not found", id))),
        }
    }

    async fn reset(&self, id: Uuid) -> Result<Key, DomainError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE keys
            SET status = 'active', usage_count = 0, last_used_at = NULL, updated_at = NOW()
            WHERE id = $1
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to reset key: {}", e)))?;

        match row {
            Some(row) => row_to_key(&row),
            None => Err(DomainError::not_found(format!("key '{}' not found", id))),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DomainError> {
        let token: Option<String> =
            sqlx::query_scalar("DELETE FROM keys WHERE id = $1 RETURNING token")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| DomainError::storage(format!("Failed to delete key: {}", e)))?;

        match token {
            Some(token) => {
                sqlx::query(
                    "INSERT INTO retired_tokens (token) VALUES ($1) ON CONFLICT DO NOTHING",
                )
                .bind(token)
                .execute(&self.pool)
                .await
                .map_err(|e| DomainError::storage(format!("Failed to retire token: {}", e)))?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list(&self, filter: &KeyFilter, page: Page) -> Result<Vec<Key>, DomainError> {
        let mut builder =
            QueryBuilder::new(format!("SELECT {SELECT_COLUMNS} FROM keys"));
        Self::push_filter(&mut builder, filter);
        builder
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to list keys: {}", e)))?;

        let mut keys = Vec::with_capacity(rows.len());
        for row in rows {
            keys.push(row_to_key(&row)?);
        }

        Ok(keys)
    }

    async fn count(&self, filter: &KeyFilter) -> Result<i64, DomainError> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM keys");
        Self::push_filter(&mut builder, filter);

        let count: i64 = builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to count keys: {}", e)))?;

        Ok(count)
    }

    async fn stats(&self) -> Result<StoreStats, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE status = 'active') AS active,
                COUNT(*) FILTER (WHERE status = 'locked') AS locked,
                COUNT(*) FILTER (WHERE status = 'expired') AS expired,
                COUNT(*) FILTER (WHERE status = 'deleted') AS deleted,
                COUNT(*) FILTER (WHERE kind = 'server') AS server_keys,
                COUNT(*) FILTER (WHERE kind = 'user') AS user_keys,
                COALESCE(SUM(usage_count), 0) AS total_usage
            FROM keys
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to load stats: {}", e)))?;

        let mut stats = StoreStats {
            total: row.try_get("total").unwrap_or(0),
            active: row.try_get("active").unwrap_or(0),
            locked: row.try_get("locked").unwrap_or(0),
            expired: row.try_get("expired").unwrap_or(0),
            deleted: row.try_get("deleted").unwrap_or(0),
            server_keys: row.try_get("server_keys").unwrap_or(0),
            user_keys: row.try_get("user_keys").unwrap_or(0),
            total_usage: row.try_get("total_usage").unwrap_or(0),
            ..Default::default()
        };

        if stats.total > 0 {
            stats.average_usage = stats.total_usage as f64 / stats.total as f64;
        }

        let recent = sqlx::query(
            r#"
            SELECT id, kind, token, last_used_at, usage_count
            FROM keys
            WHERE last_used_at IS NOT NULL
            ORDER BY last_used_at DESC
            LIMIT 10
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to load recent activity: {}", e)))?;

        stats.recent_activity = recent
            .into_iter()
            .map(|row| RecentUse {
                id: row.get("id"),
                kind: KeyKind::parse(row.get::<String, _>("kind").as_str()).unwrap_or_default(),
                token: row.get("token"),
                last_used_at: row.get("last_used_at"),
                usage_count: row.get("usage_count"),
            })
            .collect();

        Ok(stats)
    }

    async fn log_action(&self, key_id: Uuid, action: &str, details: Option<&str>) {
        // Best effort, a failed audit insert never fails the operation
        let result = sqlx::query(
            "INSERT INTO key_actions (key_id, action, details) VALUES ($1, $2, $3)",
        )
        .bind(key_id)
        .bind(action)
        .bind(details)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            warn!(key_id = %key_id, action, "failed to record key action: {}", e);
        }
    }
}

fn row_to_key(row: &PgRow) -> Result<Key, DomainError> {
    let id: Uuid = row
        .try_get("id")
        .map_err(|e| DomainError::storage(format!("Invalid key row: {}", e)))?;
    let token: String = row
        .try_get("token")
        .map_err(|e| DomainError::storage(format!("Invalid key row: {}", e)))?;
    let kind: String = row
        .try_get("kind")
        .map_err(|e| DomainError::storage(format!("Invalid key row: {}", e)))?;
    let status: String = row
        .try_get("status")
        .map_err(|e| DomainError::storage(format!("Invalid key row: {}", e)))?;

    Ok(Key::from_stored(
        id,
        token,
        KeyKind::parse(&kind).unwrap_or_default(),
        row.try_get("owner").unwrap_or(None),
        row.try_get("description").unwrap_or(None),
        KeyStatus::parse_lenient(&status),
        row.try_get("created_at")
            .map_err(|e| DomainError::storage(format!("Invalid key row: {}", e)))?,
        row.try_get("updated_at")
            .map_err(|e| DomainError::storage(format!("Invalid key row: {}", e)))?,
        row.try_get("expires_at").unwrap_or(None),
        row.try_get("last_used_at").unwrap_or(None),
        row.try_get("usage_count").unwrap_or(0),
        row.try_get("usage_limit").unwrap_or(None),
    ))
}
