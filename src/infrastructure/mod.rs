//! Infrastructure layer: stores, services and runtime plumbing

pub mod admin;
pub mod auth;
pub mod key;
pub mod logging;
