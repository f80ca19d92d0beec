//! Shared API types

mod error;
mod json;

pub use error::{ApiError, ApiErrorResponse};
pub use json::Json;
