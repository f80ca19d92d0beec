//! Key store trait

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Debug;
use uuid::Uuid;

use super::entity::{Key, KeyKind, KeyStatus};
use crate::domain::DomainError;

/// Filter for listing keys
#[derive(Debug, Clone, Default)]
pub struct KeyFilter {
    pub kind: Option<KeyKind>,
    pub status: Option<KeyStatus>,
    /// Substring match against token, owner and description
    pub search: Option<String>,
}

impl KeyFilter {
    pub fn matches(&self, key: &Key) -> bool {
        if let Some(kind) = self.kind {
            if key.kind() != kind {
                return false;
            }
        }

        if let Some(status) = self.status {
            if key.status() != status {
                return false;
            }
        }

        if let Some(ref term) = self.search {
            let term = term.to_lowercase();
            let hit = key.token().to_lowercase().contains(&term)
                || key
                    .owner()
                    .is_some_and(|o| o.to_lowercase().contains(&term))
                || key
                    .description()
                    .is_some_and(|d| d.to_lowercase().contains(&term));
            if !hit {
                return false;
            }
        }

        true
    }
}

/// Pagination window for listing keys
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub const DEFAULT_LIMIT: i64 = 50;
    pub const MAX_LIMIT: i64 = 200;

    /// Build a page, clamping the limit to [1, MAX_LIMIT]
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        Self {
            limit: limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT),
            offset: offset.unwrap_or(0).max(0),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// A recently used key, for the stats endpoint
#[derive(Debug, Clone, Serialize)]
pub struct RecentUse {
    pub id: Uuid,
    pub kind: KeyKind,
    pub token: String,
    pub last_used_at: DateTime<Utc>,
    pub usage_count: i64,
}

/// Aggregate statistics over the key store
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    pub total: i64,
    pub active: i64,
    pub locked: i64,
    pub expired: i64,
    pub deleted: i64,
    pub server_keys: i64,
    pub user_keys: i64,
    pub total_usage: i64,
    pub average_usage: f64,
    pub recent_activity: Vec<RecentUse>,
}

/// Durable record store for key entities.
///
/// Each mutation method applies as a single indivisible record update so
/// that concurrent validations of the same key never lose increments.
#[async_trait]
pub trait KeyStore: Send + Sync + Debug {
    /// Insert a newly created key; fails with `Conflict` on duplicate token
    async fn insert(&self, key: Key) -> Result<Key, DomainError>;

    /// Look up a key by its opaque token
    async fn find_by_token(&self, token: &str) -> Result<Option<Key>, DomainError>;

    /// Look up a key by its durable id
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Key>, DomainError>;

    /// Whole-record update for metadata/status edits; `NotFound` when absent
    async fn update(&self, key: &Key) -> Result<Key, DomainError>;

    /// Atomically increment usage_count and set last_used_at
    async fn record_use(&self, id: Uuid, now: DateTime<Utc>) -> Result<Key, DomainError>;

    /// Atomically set the status
    async fn set_status(&self, id: Uuid, status: KeyStatus) -> Result<Key, DomainError>;

    /// Atomically reset to active with cleared usage accounting
    async fn reset(&self, id: Uuid) -> Result<Key, DomainError>;

    /// Hard-delete the record; returns whether a record was removed
    async fn delete(&self, id: Uuid) -> Result<bool, DomainError>;

    /// List keys matching the filter, newest first
    async fn list(&self, filter: &KeyFilter, page: Page) -> Result<Vec<Key>, DomainError>;

    /// Count keys matching the filter
    async fn count(&self, filter: &KeyFilter) -> Result<i64, DomainError>;

    /// Aggregate statistics
    async fn stats(&self) -> Result<StoreStats, DomainError>;

    /// Best-effort append-only action log; failures must not propagate
    async fn log_action(&self, _key_id: Uuid, _action: &str, _details: Option<&str>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_matches_kind_and_status() {
        let mut key = Key::new(KeyKind::User, "USR_AAAA").with_owner("alice");
        key.lock();

        let filter = KeyFilter {
            kind: Some(KeyKind::User),
            status: Some(KeyStatus::Locked),
            search: None,
        };
        assert!(filter.matches(&key));

        let filter = KeyFilter {
            kind: Some(KeyKind::Server),
            ..Default::default()
        };
        assert!(!filter.matches(&key));
    }

    #[test]
    fn test_filter_search_is_case_insensitive() {
        let key = Key::new(KeyKind::Server, "SRV_ROUTER1")
            .with_owner("Edge Router")
            .with_description("lab gateway");

        let search = |term: &str| KeyFilter {
            search: Some(term.to_string()),
            ..Default::default()
        };

        assert!(search("router").matches(&key));
        assert!(search("srv_").matches(&key));
        assert!(search("GATEWAY").matches(&key));
        assert!(!search("printer").matches(&key));
    }

    #[test]
    fn test_page_clamps_limit() {
        let page = Page::new(Some(1000), Some(-5));
        assert_eq!(page.limit, Page::MAX_LIMIT);
        assert_eq!(page.offset, 0);

        let page = Page::new(None, None);
        assert_eq!(page.limit, Page::DEFAULT_LIMIT);
    }
}
