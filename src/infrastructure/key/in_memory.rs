//! In-memory key store implementation
//!
//! Used for tests and storeless (non-durable) operation. Each mutation
//! happens under a single write lock, matching the indivisible-update
//! requirement of the `KeyStore` contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::key::{Key, KeyFilter, KeyKind, KeyStatus, KeyStore, Page, RecentUse, StoreStats};
use crate::domain::DomainError;

/// One entry of the best-effort action log
#[derive(Debug, Clone)]
pub struct ActionLogEntry {
    pub key_id: Uuid,
    pub action: String,
    pub details: Option<String>,
    pub at: DateTime<Utc>,
}

/// In-memory implementation of `KeyStore`
#[derive(Debug, Default)]
pub struct InMemoryKeyStore {
    keys: Arc<RwLock<HashMap<Uuid, Key>>>,
    token_index: Arc<RwLock<HashMap<String, Uuid>>>,
    /// Tokens of hard-deleted keys; never handed out again within a run
    retired_tokens: Arc<RwLock<HashSet<String>>>,
    actions: Arc<RwLock<Vec<ActionLogEntry>>>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with keys
    pub fn with_keys(keys: Vec<Key>) -> Self {
        let store = Self::new();

        let keys_map: HashMap<Uuid, Key> = keys.iter().map(|k| (k.id(), k.clone())).collect();
        let token_map: HashMap<String, Uuid> = keys
            .iter()
            .map(|k| (k.token().to_string(), k.id()))
            .collect();

        *futures::executor::block_on(store.keys.write()) = keys_map;
        *futures::executor::block_on(store.token_index.write()) = token_map;

        store
    }

    /// Recorded action log entries (for inspection in tests)
    pub async fn actions(&self) -> Vec<ActionLogEntry> {
        self.actions.read().await.clone()
    }
}

#[async_trait]
impl KeyStore for InMemoryKeyStore {
    async fn insert(&self, key: Key) -> Result<Key, DomainError> {
        let mut keys = self.keys.write().await;
        let mut token_index = self.token_index.write().await;
        let retired = self.retired_tokens.read().await;

        let token = key.token().to_string();

        if token_index.contains_key(&token) || retired.contains(&token) {
            return Err(DomainError::conflict(format!(
                "key with token '{}' already exists",
                token
            )));
        }

        token_index.insert(token, key.id());
        keys.insert(key.id(), key.clone());

        Ok(key)
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<Key>, DomainError> {
        let token_index = self.token_index.read().await;

        if let Some(id) = token_index.get(token) {
            let keys = self.keys.read().await;
            Ok(keys.get(id).cloned())
        } else {
            Ok(None)
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Key>, DomainError> {
        let keys = self.keys.read().await;
        Ok(keys.get(&id).cloned())
    }

    async fn update(&self, key: &Key) -> Result<Key, DomainError> {
        let mut keys = self.keys.write().await;

        if !keys.contains_key(&key.id()) {
            return Err(DomainError::not_found(format!(
                "key '{}' not found",
                key.id()
            )));
        }

        keys.insert(key.id(), key.clone());
        Ok(key.clone())
    }

    async fn record_use(&self, id: Uuid, now: DateTime<Utc>) -> Result<Key, DomainError> {
        let mut keys = self.keys.write().await;

        match keys.get_mut(&id) {
            Some(key) => {
                key.record_use(now);
                Ok(key.clone())
            }
            None => Err(DomainError::not_found(format!("key '{}' not found", id))),
        }
    }

    async fn set_status(&self, id: Uuid, status: KeyStatus) -> Result<Key, DomainError> {
        let mut keys = self.keys.write().await;

        match keys.get_mut(&id) {
            Some(key) => {
                key.set_status(status);
                Ok(key.clone())
            }
            None => Err(DomainError::not_found(format!("key '{}' not found", id))),
        }
    }

    async fn reset(&self, id: Uuid) -> Result<Key, DomainError> {
        let mut keys = self.keys.write().await;

        match keys.get_mut(&id) {
            Some(key) => {
                key.reset();
                Ok(key.clone())
            }
            None => Err(DomainError::not_found(format!("key '{}' not found", id))),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DomainError> {
        let mut keys = self.keys.write().await;
        let mut token_index = self.token_index.write().await;
        let mut retired = self.retired_tokens.write().await;

        if let Some(key) = keys.remove(&id) {
            token_index.remove(key.token());
            retired.insert(key.token().to_string());
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn list(&self, filter: &KeyFilter, page: Page) -> Result<Vec<Key>, DomainError> {
        let keys = self.keys.read().await;

        let mut result: Vec<Key> = keys.values().filter(|k| filter.matches(k)).cloned().collect();
        result.sort_by(|a, b| b.created_at().cmp(&a.created_at()));

        Ok(result
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect())
    }

    async fn count(&self, filter: &KeyFilter) -> Result<i64, DomainError> {
        let keys = self.keys.read().await;
        Ok(keys.values().filter(|k| filter.matches(k)).count() as i64)
    }

    async fn stats(&self) -> Result<StoreStats, DomainError> {
        let keys = self.keys.read().await;

        let mut stats = StoreStats::default();

        for key in keys.values() {
            stats.total += 1;
            match key.status() {
                KeyStatus::Active => stats.active += 1,
                KeyStatus::Locked => stats.locked += 1,
                KeyStatus::Expired => stats.expired += 1,
                KeyStatus::Deleted => stats.deleted += 1,
            }
            match key.kind() {
                KeyKind::Server => stats.server_keys += 1,
                KeyKind::User => stats.user_keys += 1,
            }
            stats.total_usage += key.usage_count();
        }

        if stats.total > 0 {
            stats.average_usage = stats.total_usage as f64 / stats.total as f64;
        }

        let mut recent: Vec<&Key> = keys.values().filter(|k| k.last_used_at().is_some()).collect();
        recent.sort_by(|a, b| b.last_used_at().cmp(&a.last_used_at()));
        stats.recent_activity = recent
            .into_iter()
            .take(10)
            .map(|k| RecentUse {
                id: k.id(),
                kind: k.kind(),
                token: k.token().to_string(),
                last_used_at: k.last_used_at().unwrap_or_else(Utc::now),
                usage_count: k.usage_count(),
            })
            .collect();

        Ok(stats)
    }

    async fn log_action(&self, key_id: Uuid, action: &str, details: Option<&str>) {
        let mut actions = self.actions.write().await;
        actions.push(ActionLogEntry {
            key_id,
            action: action.to_string(),
            details: details.map(String::from),
            at: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_key(token: &str) -> Key {
        Key::new(KeyKind::Server, token).with_owner(format!("owner of {token}"))
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = InMemoryKeyStore::new();
        let key = server_key("SRV_AAAAAAAAAAAAAAAAAAAA");

        store.insert(key.clone()).await.unwrap();

        let by_token = store.find_by_token(key.token()).await.unwrap();
        assert_eq!(by_token.unwrap().id(), key.id());

        let by_id = store.find_by_id(key.id()).await.unwrap();
        assert!(by_id.is_some());
    }

    #[tokio::test]
    async fn test_insert_duplicate_token() {
        let store = InMemoryKeyStore::new();

        store
            .insert(server_key("SRV_DUPLICATE0000000000"))
            .await
            .unwrap();
        let result = store.insert(server_key("SRV_DUPLICATE0000000000")).await;

        assert!(result.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn test_token_not_reused_after_hard_delete() {
        let store = InMemoryKeyStore::new();
        let key = server_key("SRV_RETIRED123456789012");

        store.insert(key.clone()).await.unwrap();
        assert!(store.delete(key.id()).await.unwrap());

        // A new key with the same token must be rejected
        let result = store.insert(server_key("SRV_RETIRED123456789012")).await;
        assert!(result.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn test_record_use_is_cumulative() {
        let store = InMemoryKeyStore::new();
        let key = server_key("SRV_USAGE000000000000000");
        store.insert(key.clone()).await.unwrap();

        store.record_use(key.id(), Utc::now()).await.unwrap();
        let updated = store.record_use(key.id(), Utc::now()).await.unwrap();

        assert_eq!(updated.usage_count(), 2);
        assert!(updated.last_used_at().is_some());
    }

    #[tokio::test]
    async fn test_set_status_and_reset() {
        let store = InMemoryKeyStore::new();
        let key = server_key("SRV_STATUS00000000000000");
        store.insert(key.clone()).await.unwrap();

        let locked = store.set_status(key.id(), KeyStatus::Locked).await.unwrap();
        assert_eq!(locked.status(), KeyStatus::Locked);

        store.record_use(key.id(), Utc::now()).await.ok();
        let reset = store.reset(key.id()).await.unwrap();
        assert_eq!(reset.status(), KeyStatus::Active);
        assert_eq!(reset.usage_count(), 0);
        assert!(reset.last_used_at().is_none());
    }

    #[tokio::test]
    async fn test_mutations_on_missing_key() {
        let store = InMemoryKeyStore::new();
        let id = Uuid::new_v4();

        assert!(store.record_use(id, Utc::now()).await.is_err());
        assert!(store.set_status(id, KeyStatus::Locked).await.is_err());
        assert!(store.reset(id).await.is_err());
        assert!(!store.delete(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_newest_first_with_pagination() {
        let mut seed = Vec::new();
        for i in 0..5 {
            seed.push(server_key(&format!("SRV_LIST{i}0000000000000000")));
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
        let store = InMemoryKeyStore::with_keys(seed);

        let page = store
            .list(&KeyFilter::default(), Page::new(Some(2), Some(0)))
            .await
            .unwrap();
        assert_eq!(page.len(), 2);
        assert!(page[0].created_at() >= page[1].created_at());

        let rest = store
            .list(&KeyFilter::default(), Page::new(Some(10), Some(4)))
            .await
            .unwrap();
        assert_eq!(rest.len(), 1);
    }

    #[tokio::test]
    async fn test_stats() {
        let active = server_key("SRV_STATS000000000000001");
        let locked = Key::new(KeyKind::User, "USR_STATS000000000000002");

        let store = InMemoryKeyStore::with_keys(vec![active.clone(), locked.clone()]);
        store.set_status(locked.id(), KeyStatus::Locked).await.unwrap();
        store.record_use(active.id(), Utc::now()).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.locked, 1);
        assert_eq!(stats.server_keys, 1);
        assert_eq!(stats.user_keys, 1);
        assert_eq!(stats.total_usage, 1);
        assert!((stats.average_usage - 0.5).abs() < f64::EPSILON);
        assert_eq!(stats.recent_activity.len(), 1);
    }

    #[tokio::test]
    async fn test_action_log() {
        let store = InMemoryKeyStore::new();
        let id = Uuid::new_v4();

        store.log_action(id, "created", Some("batch")).await;
        store.log_action(id, "locked", None).await;

        let actions = store.actions().await;
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].action, "created");
    }
}
