//! Key domain: entity, lifecycle states and the store contract

mod entity;
mod store;
mod validation;

pub use entity::{Key, KeyKind, KeyStatus};
pub use store::{KeyFilter, KeyStore, Page, RecentUse, StoreStats};
pub use validation::{
    validate_batch_count, validate_expires_in_days, validate_prefix, validate_usage_limit,
    KeyInputError, MAX_BATCH_COUNT, MAX_PREFIX_LENGTH,
};
