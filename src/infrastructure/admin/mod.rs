//! Admin account infrastructure: hashing, repositories and service

mod in_memory;
mod password;
mod postgres;
mod service;

pub use in_memory::InMemoryAdminRepository;
pub use password::{Argon2Hasher, PasswordHasher};
pub use postgres::PostgresAdminRepository;
pub use service::AdminService;
