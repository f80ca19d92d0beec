//! Domain layer: entities, lifecycle rules and store contracts

pub mod admin;
mod error;
pub mod key;

pub use error::DomainError;
pub use key::{Key, KeyKind, KeyStatus};
