//! HTTP API layer

pub mod admin;
pub mod auth;
pub mod middleware;
pub mod public;
pub mod router;
pub mod state;
pub mod types;

pub use router::create_router_with_state;
