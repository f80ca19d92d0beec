//! Key entity and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Discriminant between the two key flavors.
///
/// Both kinds share the same entity shape and lifecycle; the kind only
/// selects default TTL, token prefix and the public response field naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum KeyKind {
    /// Infrastructure-level key, long TTL
    #[default]
    Server,
    /// Per-user/device key, short TTL
    User,
}

impl KeyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::User => "user",
        }
    }

    /// Token prefix used when the caller does not supply one
    pub fn default_prefix(&self) -> &'static str {
        match self {
            Self::Server => "SRV",
            Self::User => "USR",
        }
    }

    /// Default expiry window in days for newly generated keys
    pub fn default_ttl_days(&self) -> i64 {
        match self {
            Self::Server => 30,
            Self::User => 7,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "server" => Some(Self::Server),
            "user" => Some(Self::User),
            _ => None,
        }
    }
}

impl std::fmt::Display for KeyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum KeyStatus {
    /// Key validates and counts usage
    #[default]
    Active,
    /// Key is blocked until an explicit unlock or reset
    Locked,
    /// Key passed its expiry and was observed doing so
    Expired,
    /// Soft-deleted; never validates, recoverable via reset
    Deleted,
}

impl KeyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Locked => "locked",
            Self::Expired => "expired",
            Self::Deleted => "deleted",
        }
    }

    /// Parse a persisted status string.
    ///
    /// Unknown values are a data-integrity problem; they are logged and
    /// coerced to `Active` so legacy rows keep working.
    pub fn parse_lenient(s: &str) -> Self {
        match s {
            "active" => Self::Active,
            "locked" => Self::Locked,
            "expired" => Self::Expired,
            "deleted" => Self::Deleted,
            other => {
                tracing::warn!(status = %other, "unrecognized key status in storage, coercing to active");
                Self::Active
            }
        }
    }
}

impl std::fmt::Display for KeyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Key {
    /// Durable identifier, assigned at creation
    id: Uuid,
    /// Opaque credential string, `{PREFIX}_{randomness}`, unique forever
    token: String,
    kind: KeyKind,
    /// Holder identifier: free-form name for server keys, user id for user keys
    #[serde(skip_serializing_if = "Option::is_none")]
    owner: Option<String>,
    /// Purpose for server keys, device for user keys
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    status: KeyStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    /// None = never expires
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_used_at: Option<DateTime<Utc>>,
    usage_count: i64,
    /// None or 0 = unlimited
    #[serde(skip_serializing_if = "Option::is_none")]
    usage_limit: Option<i64>,
}

impl Key {
    /// Create a new key in the initial `Active` state
    pub fn new(kind: KeyKind, token: impl Into<String>) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4(),
            token: token.into(),
            kind,
            owner: None,
            description: None,
            status: KeyStatus::Active,
            created_at: now,
            updated_at: now,
            expires_at: None,
            last_used_at: None,
            usage_count: 0,
            usage_limit: None,
        }
    }

    /// Rebuild a key from stored fields (used by store implementations)
    #[allow(clippy::too_many_arguments)]
    pub fn from_stored(
        id: Uuid,
        token: String,
        kind: KeyKind,
        owner: Option<String>,
        description: Option<String>,
        status: KeyStatus,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
        last_used_at: Option<DateTime<Utc>>,
        usage_count: i64,
        usage_limit: Option<i64>,
    ) -> Self {
        Self {
            id,
            token,
            kind,
            owner,
            description,
            status,
            created_at,
            updated_at,
            expires_at,
            last_used_at,
            usage_count,
            usage_limit,
        }
    }

    /// Set owner
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Set description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set expiration
    pub fn with_expiration(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Set usage limit (0 is normalized to unlimited)
    pub fn with_usage_limit(mut self, limit: i64) -> Self {
        self.usage_limit = if limit > 0 { Some(limit) } else { None };
        self
    }

    // Getters

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn kind(&self) -> KeyKind {
        self.kind
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn status(&self) -> KeyStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn last_used_at(&self) -> Option<DateTime<Utc>> {
        self.last_used_at
    }

    pub fn usage_count(&self) -> i64 {
        self.usage_count
    }

    pub fn usage_limit(&self) -> Option<i64> {
        self.usage_limit
    }

    // Status checks

    /// Check if the key has a past expiry at the given instant
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= now,
            None => false,
        }
    }

    /// Check if the usage limit is set and already reached
    pub fn is_limit_reached(&self) -> bool {
        match self.usage_limit {
            Some(limit) if limit > 0 => self.usage_count >= limit,
            _ => false,
        }
    }

    // Mutators

    /// Update the owner
    pub fn set_owner(&mut self, owner: Option<String>) {
        self.owner = owner;
        self.touch();
    }

    /// Update the description
    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description;
        self.touch();
    }

    /// Update the status
    pub fn set_status(&mut self, status: KeyStatus) {
        self.status = status;
        self.touch();
    }

    /// Record a successful validation
    pub fn record_use(&mut self, now: DateTime<Utc>) {
        self.usage_count += 1;
        self.last_used_at = Some(now);
        self.updated_at = now;
    }

    /// Lock the key (no-op when already locked)
    pub fn lock(&mut self) {
        if self.status != KeyStatus::Locked {
            self.status = KeyStatus::Locked;
            self.touch();
        }
    }

    /// Unlock a locked key
    pub fn unlock(&mut self) {
        if self.status == KeyStatus::Locked {
            self.status = KeyStatus::Active;
            self.touch();
        }
    }

    /// Soft-delete the key
    pub fn soft_delete(&mut self) {
        self.status = KeyStatus::Deleted;
        self.touch();
    }

    /// Reset the key to a fresh active state, clearing usage accounting
    pub fn reset(&mut self) {
        self.status = KeyStatus::Active;
        self.usage_count = 0;
        self.last_used_at = None;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
