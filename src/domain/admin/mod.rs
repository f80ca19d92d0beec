//! Admin account domain types

mod entity;
mod repository;

pub use entity::{Admin, ROOT_ADMIN_USERNAME};
pub use repository::AdminRepository;
