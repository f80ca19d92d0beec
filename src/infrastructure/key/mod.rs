//! Key infrastructure: token generation, lifecycle service and stores

mod generator;
mod in_memory;
mod postgres;
mod service;

pub use generator::{TokenGenerator, DEFAULT_TOKEN_LENGTH, MIN_TOKEN_LENGTH};
pub use in_memory::InMemoryKeyStore;
pub use postgres::PostgresKeyStore;
pub use service::{
    CreateKeyRequest, CreatedKey, EnginePolicy, InvalidReason, KeyProjection, KeyService,
    ValidationOutcome,
};
