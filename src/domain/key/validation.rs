//! Input validation for key operations

use thiserror::Error;

/// Maximum number of keys a single batch-generate request may create
pub const MAX_BATCH_COUNT: i64 = 100;

/// Maximum custom token prefix length
pub const MAX_PREFIX_LENGTH: usize = 16;

/// Errors that can occur while validating key operation inputs
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyInputError {
    #[error("batch count must be between 1 and {MAX_BATCH_COUNT}")]
    BatchCountOutOfRange,

    #[error("expires_in_days must not be negative")]
    NegativeTtl,

    #[error("usage_limit must not be negative")]
    NegativeUsageLimit,

    #[error("prefix cannot be empty")]
    EmptyPrefix,

    #[error("prefix exceeds maximum length of {MAX_PREFIX_LENGTH} characters")]
    PrefixTooLong,

    #[error("prefix contains invalid character: '{0}'. Only uppercase letters and digits are allowed")]
    InvalidPrefixCharacter(char),
}

/// Validate a batch-generate count
pub fn validate_batch_count(count: i64) -> Result<(), KeyInputError> {
    if count <= 0 || count > MAX_BATCH_COUNT {
        return Err(KeyInputError::BatchCountOutOfRange);
    }
    Ok(())
}

/// Validate an expiry window in days (0 means no expiry and is accepted)
pub fn validate_expires_in_days(days: i64) -> Result<(), KeyInputError> {
    if days < 0 {
        return Err(KeyInputError::NegativeTtl);
    }
    Ok(())
}

/// Validate a usage limit (0 means unlimited and is accepted)
pub fn validate_usage_limit(limit: i64) -> Result<(), KeyInputError> {
    if limit < 0 {
        return Err(KeyInputError::NegativeUsageLimit);
    }
    Ok(())
}

/// Validate a custom token prefix.
///
/// Rules: non-empty, at most 16 characters, uppercase alphanumeric only.
pub fn validate_prefix(prefix: &str) -> Result<(), KeyInputError> {
    if prefix.is_empty() {
        return Err(KeyInputError::EmptyPrefix);
    }

    if prefix.len() > MAX_PREFIX_LENGTH {
        return Err(KeyInputError::PrefixTooLong);
    }

    for c in prefix.chars() {
        if !c.is_ascii_uppercase() && !c.is_ascii_digit() {
            return Err(KeyInputError::InvalidPrefixCharacter(c));
        }
    }

    Ok(())
}
