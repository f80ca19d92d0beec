//! Key lifecycle and validation service
//!
//! All state transitions and the validation protocol live here. Handlers
//! stay thin and call into this service through `AppState`.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::key::{
    validate_batch_count, validate_expires_in_days, validate_usage_limit, Key, KeyFilter, KeyKind,
    KeyStatus, KeyStore, Page, StoreStats,
};
use crate::domain::DomainError;
use crate::infrastructure::key::TokenGenerator;

/// Toggles for how the engine reacts to observed limit and expiry states
#[derive(Debug, Clone, Copy)]
pub struct EnginePolicy {
    /// Persist `locked` when a validation hits the usage limit
    pub lockout_on_limit_exceeded: bool,
    /// Persist `expired` when a validation observes a past expiry
    pub auto_expire_on_observe: bool,
}

impl Default for EnginePolicy {
    fn default() -> Self {
        Self {
            lockout_on_limit_exceeded: true,
            auto_expire_on_observe: true,
        }
    }
}

/// Input for creating one key
#[derive(Debug, Clone, Default)]
pub struct CreateKeyRequest {
    pub kind: KeyKind,
    pub owner: Option<String>,
    pub description: Option<String>,
    pub usage_limit: Option<i64>,
    pub expires_in_days: Option<i64>,
    pub prefix: Option<String>,
}

/// A freshly created key together with its plaintext token.
/// The token is only surfaced here, at creation time.
#[derive(Debug, Clone)]
pub struct CreatedKey {
    pub key: Key,
    pub token: String,
}

/// Why a validation rejected a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    NotFound,
    Deleted,
    Locked,
    Expired,
    LimitExceeded,
}

impl InvalidReason {
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Deleted => "deleted",
            Self::Locked => "locked",
            Self::Expired => "expired",
            Self::LimitExceeded => "limit_exceeded",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::NotFound => "invalid key",
            Self::Deleted => "key has been deleted",
            Self::Locked => "key is locked",
            Self::Expired => "key has expired",
            Self::LimitExceeded => "usage limit exceeded",
        }
    }
}

/// Non-secret projection of a key returned on successful validation
#[derive(Debug, Clone, Serialize)]
pub struct KeyProjection {
    pub id: Uuid,
    pub kind: KeyKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub usage_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub status: KeyStatus,
}

impl From<&Key> for KeyProjection {
    fn from(key: &Key) -> Self {
        Self {
            id: key.id(),
            kind: key.kind(),
            owner: key.owner().map(String::from),
            description: key.description().map(String::from),
            usage_count: key.usage_count(),
            usage_limit: key.usage_limit(),
            expires_at: key.expires_at(),
            status: key.status(),
        }
    }
}

/// Result of validating a token
#[derive(Debug, Clone)]
pub enum ValidationOutcome {
    Valid(KeyProjection),
    Invalid(InvalidReason),
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }
}

/// Key lifecycle service
#[derive(Debug, Clone)]
pub struct KeyService {
    store: Arc<dyn KeyStore>,
    generator: TokenGenerator,
    policy: EnginePolicy,
}

impl KeyService {
    pub fn new(store: Arc<dyn KeyStore>, generator: TokenGenerator, policy: EnginePolicy) -> Self {
        Self {
            store,
            generator,
            policy,
        }
    }

    /// Create one key. On a token collision a single retry with a fresh
    /// token is attempted before giving up.
    pub async fn create(&self, request: CreateKeyRequest) -> Result<CreatedKey, DomainError> {
        if let Some(limit) = request.usage_limit {
            validate_usage_limit(limit).map_err(|e| DomainError::validation(e.to_string()))?;
        }
        if let Some(days) = request.expires_in_days {
            validate_expires_in_days(days).map_err(|e| DomainError::validation(e.to_string()))?;
        }

        let first = self.build_key(&request)?;
        let stored = match self.store.insert(first).await {
            Ok(key) => key,
            Err(err) if err.is_conflict() => {
                warn!("token collision on insert, retrying with a fresh token");
                let retry = self.build_key(&request)?;
                self.store.insert(retry).await?
            }
            Err(err) => return Err(err),
        };

        self.store
            .log_action(stored.id(), "created", request.owner.as_deref())
            .await;
        info!(key_id = %stored.id(), kind = %stored.kind(), "key created");

        let token = stored.token().to_string();
        Ok(CreatedKey { key: stored, token })
    }

    /// Create up to `MAX_BATCH_COUNT` keys with shared attributes
    pub async fn create_batch(
        &self,
        request: CreateKeyRequest,
        count: i64,
    ) -> Result<Vec<CreatedKey>, DomainError> {
        validate_batch_count(count).map_err(|e| DomainError::validation(e.to_string()))?;

        let mut created = Vec::with_capacity(count as usize);
        for _ in 0..count {
            created.push(self.create(request.clone()).await?);
        }

        Ok(created)
    }

    fn build_key(&self, request: &CreateKeyRequest) -> Result<Key, DomainError> {
        let token = match &request.prefix {
            Some(prefix) => self.generator.generate_with_prefix(prefix)?,
            None => self.generator.generate(request.kind)?,
        };

        let mut key = Key::new(request.kind, token);

        if let Some(owner) = &request.owner {
            key = key.with_owner(owner.clone());
        }
        if let Some(description) = &request.description {
            key = key.with_description(description.clone());
        }
        if let Some(limit) = request.usage_limit {
            key = key.with_usage_limit(limit);
        }

        // 0 is the explicit no-expiry signal; absent means the kind default
        match request.expires_in_days {
            Some(0) => {}
            Some(days) => key = key.with_expiration(Utc::now() + Duration::days(days)),
            None => {
                key = key
                    .with_expiration(Utc::now() + Duration::days(request.kind.default_ttl_days()))
            }
        }

        Ok(key)
    }

    /// Validate a token regardless of kind
    pub async fn validate(&self, token: &str) -> Result<ValidationOutcome, DomainError> {
        self.validate_inner(token, None).await
    }

    /// Validate a token and require it to be of `kind`. A key of the
    /// wrong kind is indistinguishable from an unknown token.
    pub async fn validate_kind(
        &self,
        token: &str,
        kind: KeyKind,
    ) -> Result<ValidationOutcome, DomainError> {
        self.validate_inner(token, Some(kind)).await
    }

    async fn validate_inner(
        &self,
        token: &str,
        expected_kind: Option<KeyKind>,
    ) -> Result<ValidationOutcome, DomainError> {
        let key = match self.store.find_by_token(token).await? {
            Some(key) => key,
            None => return Ok(ValidationOutcome::Invalid(InvalidReason::NotFound)),
        };

        if let Some(kind) = expected_kind {
            if key.kind() != kind {
                debug!(key_id = %key.id(), "kind mismatch on validation");
                return Ok(ValidationOutcome::Invalid(InvalidReason::NotFound));
            }
        }

        match key.status() {
            KeyStatus::Deleted => return Ok(ValidationOutcome::Invalid(InvalidReason::Deleted)),
            KeyStatus::Locked => return Ok(ValidationOutcome::Invalid(InvalidReason::Locked)),
            KeyStatus::Expired => return Ok(ValidationOutcome::Invalid(InvalidReason::Expired)),
            KeyStatus::Active => {}
        }

        let now = Utc::now();

        if key.is_expired_at(now) {
            if self.policy.auto_expire_on_observe {
                self.store.set_status(key.id(), KeyStatus::Expired).await?;
                self.store.log_action(key.id(), "expired", None).await;
                debug!(key_id = %key.id(), "key expired on observation");
            }
            return Ok(ValidationOutcome::Invalid(InvalidReason::Expired));
        }

        if key.is_limit_reached() {
            if self.policy.lockout_on_limit_exceeded {
                self.store.set_status(key.id(), KeyStatus::Locked).await?;
                self.store
                    .log_action(key.id(), "locked", Some("limit_exceeded"))
                    .await;
                debug!(key_id = %key.id(), "key locked after exceeding its usage limit");
            }
            return Ok(ValidationOutcome::Invalid(InvalidReason::LimitExceeded));
        }

        let used = self.store.record_use(key.id(), now).await?;
        Ok(ValidationOutcome::Valid(KeyProjection::from(&used)))
    }

    /// Look up a key by id
    pub async fn get(&self, id: Uuid) -> Result<Key, DomainError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("key '{}' not found", id)))
    }

    /// Look up a key by its full token
    pub async fn get_by_token(&self, token: &str) -> Result<Key, DomainError> {
        self.store
            .find_by_token(token)
            .await?
            .ok_or_else(|| DomainError::not_found("key not found"))
    }

    /// Update owner and description
    pub async fn update_metadata(
        &self,
        id: Uuid,
        owner: Option<String>,
        description: Option<String>,
    ) -> Result<Key, DomainError> {
        let mut key = self.get(id).await?;

        if owner.is_some() {
            key.set_owner(owner);
        }
        if description.is_some() {
            key.set_description(description);
        }

        let updated = self.store.update(&key).await?;
        self.store.log_action(id, "updated", None).await;
        Ok(updated)
    }

    /// Lock a key. Total: a key that is already locked or deleted is
    /// returned unchanged.
    pub async fn lock(&self, id: Uuid) -> Result<Key, DomainError> {
        let key = self.get(id).await?;
        if matches!(key.status(), KeyStatus::Locked | KeyStatus::Deleted) {
            return Ok(key);
        }

        let locked = self.store.set_status(id, KeyStatus::Locked).await?;
        self.store.log_action(id, "locked", Some("manual")).await;
        info!(key_id = %id, "key locked");
        Ok(locked)
    }

    /// Unlock a key. Total: a key that is not locked is returned unchanged.
    pub async fn unlock(&self, id: Uuid) -> Result<Key, DomainError> {
        let key = self.get(id).await?;
        if key.status() != KeyStatus::Locked {
            return Ok(key);
        }

        let unlocked = self.store.set_status(id, KeyStatus::Active).await?;
        self.store.log_action(id, "unlocked", None).await;
        info!(key_id = %id, "key unlocked");
        Ok(unlocked)
    }

    /// Reset a key to a fresh active state, clearing its usage history
    pub async fn reset(&self, id: Uuid) -> Result<Key, DomainError> {
        self.get(id).await?;

        let reset = self.store.reset(id).await?;
        self.store.log_action(id, "reset", None).await;
        info!(key_id = %id, "key reset");
        Ok(reset)
    }

    /// Mark a key deleted. The record stays in the store.
    pub async fn soft_delete(&self, id: Uuid) -> Result<Key, DomainError> {
        self.get(id).await?;

        let deleted = self.store.set_status(id, KeyStatus::Deleted).await?;
        self.store.log_action(id, "deleted", Some("soft")).await;
        info!(key_id = %id, "key soft-deleted");
        Ok(deleted)
    }

    /// Remove a key permanently. Its token is never issued again.
    pub async fn hard_delete(&self, id: Uuid) -> Result<(), DomainError> {
        if !self.store.delete(id).await? {
            return Err(DomainError::not_found(format!("key '{}' not found", id)));
        }

        self.store.log_action(id, "deleted", Some("purge")).await;
        info!(key_id = %id, "key purged");
        Ok(())
    }

    pub async fn list(&self, filter: &KeyFilter, page: Page) -> Result<Vec<Key>, DomainError> {
        self.store.list(filter, page).await
    }

    pub async fn count(&self, filter: &KeyFilter) -> Result<i64, DomainError> {
        self.store.count(filter).await
    }

    pub async fn stats(&self) -> Result<StoreStats, DomainError> {
        self.store.stats().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::key::InMemoryKeyStore;

    fn service() -> KeyService {
        KeyService::new(
            Arc::new(InMemoryKeyStore::new()),
            TokenGenerator::new(),
            EnginePolicy::default(),
        )
    }

    fn service_with_policy(policy: EnginePolicy) -> KeyService {
        KeyService::new(Arc::new(InMemoryKeyStore::new()), TokenGenerator::new(), policy)
    }

    async fn create_server_key(service: &KeyService) -> CreatedKey {
        service
            .create(CreateKeyRequest {
                kind: KeyKind::Server,
                owner: Some("acme".to_string()),
                ..Default::default()
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_sets_default_expiry() {
        let service = service();

        let created = create_server_key(&service).await;

        assert!(created.token.starts_with("SRV_"));
        let expires_at = created.key.expires_at().unwrap();
        let days = (expires_at - Utc::now()).num_days();
        assert!((29..=30).contains(&days));
    }

    #[tokio::test]
    async fn test_create_user_key_with_custom_ttl() {
        let service = service();

        let created = service
            .create(CreateKeyRequest {
                kind: KeyKind::User,
                expires_in_days: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(created.token.starts_with("USR_"));
        let days = (created.key.expires_at().unwrap() - Utc::now()).num_hours();
        assert!((23..=24).contains(&days));
    }

    #[tokio::test]
    async fn test_create_with_zero_ttl_never_expires() {
        let service = service();

        let created = service
            .create(CreateKeyRequest {
                kind: KeyKind::User,
                expires_in_days: Some(0),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(created.key.expires_at().is_none());
        assert!(service.validate(&created.token).await.unwrap().is_valid());
    }

    #[tokio::test]
    async fn test_create_rejects_bad_inputs() {
        let service = service();

        let bad_ttl = service
            .create(CreateKeyRequest {
                expires_in_days: Some(-1),
                ..Default::default()
            })
            .await;
        assert!(bad_ttl.is_err());

        let bad_limit = service
            .create(CreateKeyRequest {
                usage_limit: Some(-1),
                ..Default::default()
            })
            .await;
        assert!(bad_limit.is_err());
    }

    #[tokio::test]
    async fn test_create_batch() {
        let service = service();

        let created = service
            .create_batch(
                CreateKeyRequest {
                    kind: KeyKind::User,
                    ..Default::default()
                },
                5,
            )
            .await
            .unwrap();

        assert_eq!(created.len(), 5);
        let mut tokens: Vec<&str> = created.iter().map(|c| c.token.as_str()).collect();
        tokens.sort_unstable();
        tokens.dedup();
        assert_eq!(tokens.len(), 5);
    }

    #[tokio::test]
    async fn test_create_batch_count_bounds() {
        let service = service();

        assert!(service
            .create_batch(CreateKeyRequest::default(), 0)
            .await
            .is_err());
        assert!(service
            .create_batch(CreateKeyRequest::default(), 101)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_validate_unknown_token() {
        let service = service();

        let outcome = service.validate("SRV_DOESNOTEXIST00000000").await.unwrap();
        match outcome {
            ValidationOutcome::Invalid(reason) => assert_eq!(reason, InvalidReason::NotFound),
            _ => panic!("expected invalid"),
        }
    }

    #[tokio::test]
    async fn test_validate_increments_usage() {
        let service = service();
        let created = create_server_key(&service).await;

        let outcome = service.validate(&created.token).await.unwrap();
        match outcome {
            ValidationOutcome::Valid(projection) => {
                assert_eq!(projection.usage_count, 1);
                assert_eq!(projection.status, KeyStatus::Active);
            }
            _ => panic!("expected valid"),
        }

        let key = service.get(created.key.id()).await.unwrap();
        assert_eq!(key.usage_count(), 1);
        assert!(key.last_used_at().is_some());
    }

    #[tokio::test]
    async fn test_validate_kind_mismatch_reads_as_not_found() {
        let service = service();
        let created = create_server_key(&service).await;

        let outcome = service
            .validate_kind(&created.token, KeyKind::User)
            .await
            .unwrap();
        match outcome {
            ValidationOutcome::Invalid(reason) => assert_eq!(reason, InvalidReason::NotFound),
            _ => panic!("expected invalid"),
        }

        // Usage must not have been recorded
        let key = service.get(created.key.id()).await.unwrap();
        assert_eq!(key.usage_count(), 0);
    }

    #[tokio::test]
    async fn test_validate_locked_key() {
        let service = service();
        let created = create_server_key(&service).await;
        service.lock(created.key.id()).await.unwrap();

        let outcome = service.validate(&created.token).await.unwrap();
        match outcome {
            ValidationOutcome::Invalid(reason) => assert_eq!(reason, InvalidReason::Locked),
            _ => panic!("expected invalid"),
        }
    }

    #[tokio::test]
    async fn test_validate_expires_on_observation() {
        let service = service();
        let created = service
            .create(CreateKeyRequest::default())
            .await
            .unwrap();

        // Push the expiry into the past behind the service's back
        let mut key = service.get(created.key.id()).await.unwrap();
        key = key.with_expiration(Utc::now() - Duration::days(1));
        service.store.update(&key).await.unwrap();

        let first = service.validate(&created.token).await.unwrap();
        match first {
            ValidationOutcome::Invalid(reason) => assert_eq!(reason, InvalidReason::Expired),
            _ => panic!("expected invalid"),
        }

        // The status was persisted, so the second observation takes the
        // stored-status path and agrees.
        let stored = service.get(created.key.id()).await.unwrap();
        assert_eq!(stored.status(), KeyStatus::Expired);

        let second = service.validate(&created.token).await.unwrap();
        match second {
            ValidationOutcome::Invalid(reason) => assert_eq!(reason, InvalidReason::Expired),
            _ => panic!("expected invalid"),
        }
    }

    #[tokio::test]
    async fn test_expiry_not_persisted_when_policy_disabled() {
        let service = service_with_policy(EnginePolicy {
            lockout_on_limit_exceeded: true,
            auto_expire_on_observe: false,
        });
        let created = service.create(CreateKeyRequest::default()).await.unwrap();

        let mut key = service.get(created.key.id()).await.unwrap();
        key = key.with_expiration(Utc::now() - Duration::days(1));
        service.store.update(&key).await.unwrap();

        let outcome = service.validate(&created.token).await.unwrap();
        assert!(!outcome.is_valid());

        let stored = service.get(created.key.id()).await.unwrap();
        assert_eq!(stored.status(), KeyStatus::Active);
    }

    #[tokio::test]
    async fn test_usage_limit_boundary() {
        let service = service();
        let created = service
            .create(CreateKeyRequest {
                usage_limit: Some(3),
                ..Default::default()
            })
            .await
            .unwrap();

        // Three validations succeed, the fourth hits the limit
        for expected in 1..=3 {
            let outcome = service.validate(&created.token).await.unwrap();
            match outcome {
                ValidationOutcome::Valid(projection) => {
                    assert_eq!(projection.usage_count, expected)
                }
                _ => panic!("expected valid"),
            }
        }

        let fourth = service.validate(&created.token).await.unwrap();
        match fourth {
            ValidationOutcome::Invalid(reason) => assert_eq!(reason, InvalidReason::LimitExceeded),
            _ => panic!("expected invalid"),
        }

        let stored = service.get(created.key.id()).await.unwrap();
        assert_eq!(stored.status(), KeyStatus::Locked);
        assert_eq!(stored.usage_count(), 3);
    }

    #[tokio::test]
    async fn test_limit_does_not_lock_when_policy_disabled() {
        let service = service_with_policy(EnginePolicy {
            lockout_on_limit_exceeded: false,
            auto_expire_on_observe: true,
        });
        let created = service
            .create(CreateKeyRequest {
                usage_limit: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(service.validate(&created.token).await.unwrap().is_valid());
        let second = service.validate(&created.token).await.unwrap();
        match second {
            ValidationOutcome::Invalid(reason) => assert_eq!(reason, InvalidReason::LimitExceeded),
            _ => panic!("expected invalid"),
        }

        let stored = service.get(created.key.id()).await.unwrap();
        assert_eq!(stored.status(), KeyStatus::Active);
    }

    #[tokio::test]
    async fn test_concurrent_validations_count_once_each() {
        let service = service();
        let created = create_server_key(&service).await;

        let mut handles = Vec::new();
        for _ in 0..5 {
            let service = service.clone();
            let token = created.token.clone();
            handles.push(tokio::spawn(async move { service.validate(&token).await }));
        }

        for handle in handles {
            assert!(handle.await.unwrap().unwrap().is_valid());
        }

        let key = service.get(created.key.id()).await.unwrap();
        assert_eq!(key.usage_count(), 5);
        assert_eq!(key.status(), KeyStatus::Active);
    }

    #[tokio::test]
    async fn test_soft_deleted_key_stays_deleted() {
        let service = service();
        let created = create_server_key(&service).await;

        service.soft_delete(created.key.id()).await.unwrap();

        let outcome = service.validate(&created.token).await.unwrap();
        match outcome {
            ValidationOutcome::Invalid(reason) => assert_eq!(reason, InvalidReason::Deleted),
            _ => panic!("expected invalid"),
        }

        // Lock and unlock succeed but leave the key deleted
        let locked = service.lock(created.key.id()).await.unwrap();
        assert_eq!(locked.status(), KeyStatus::Deleted);
        let unlocked = service.unlock(created.key.id()).await.unwrap();
        assert_eq!(unlocked.status(), KeyStatus::Deleted);

        let outcome = service.validate(&created.token).await.unwrap();
        match outcome {
            ValidationOutcome::Invalid(reason) => assert_eq!(reason, InvalidReason::Deleted),
            _ => panic!("expected invalid"),
        }
    }

    #[tokio::test]
    async fn test_reset_restores_any_state() {
        let service = service();
        let created = create_server_key(&service).await;

        service.validate(&created.token).await.unwrap();
        service.soft_delete(created.key.id()).await.unwrap();

        let reset = service.reset(created.key.id()).await.unwrap();
        assert_eq!(reset.status(), KeyStatus::Active);
        assert_eq!(reset.usage_count(), 0);
        assert!(reset.last_used_at().is_none());

        assert!(service.validate(&created.token).await.unwrap().is_valid());
    }

    #[tokio::test]
    async fn test_hard_delete_removes_the_record() {
        let service = service();
        let created = create_server_key(&service).await;

        service.hard_delete(created.key.id()).await.unwrap();

        assert!(service.get(created.key.id()).await.is_err());
        let outcome = service.validate(&created.token).await.unwrap();
        match outcome {
            ValidationOutcome::Invalid(reason) => assert_eq!(reason, InvalidReason::NotFound),
            _ => panic!("expected invalid"),
        }

        assert!(service.hard_delete(created.key.id()).await.is_err());
    }

    #[tokio::test]
    async fn test_unlock_semantics() {
        let service = service();
        let created = create_server_key(&service).await;

        // Unlocking an active key succeeds without changing anything
        let noop = service.unlock(created.key.id()).await.unwrap();
        assert_eq!(noop.status(), KeyStatus::Active);

        service.lock(created.key.id()).await.unwrap();
        // Locking twice is fine too
        service.lock(created.key.id()).await.unwrap();
        let unlocked = service.unlock(created.key.id()).await.unwrap();
        assert_eq!(unlocked.status(), KeyStatus::Active);

        // Unlock does not resurrect an expired key
        service
            .store
            .set_status(created.key.id(), KeyStatus::Expired)
            .await
            .unwrap();
        let expired = service.unlock(created.key.id()).await.unwrap();
        assert_eq!(expired.status(), KeyStatus::Expired);
    }

    #[tokio::test]
    async fn test_update_metadata() {
        let service = service();
        let created = create_server_key(&service).await;

        let updated = service
            .update_metadata(
                created.key.id(),
                Some("new-owner".to_string()),
                Some("rotated".to_string()),
            )
            .await
            .unwrap();

        assert_eq!(updated.owner(), Some("new-owner"));
        assert_eq!(updated.description(), Some("rotated"));
    }
}
