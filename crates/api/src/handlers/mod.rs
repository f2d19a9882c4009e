pub mod admin;
pub mod health;

// Re-export common types
pub use crate::error::ErrorResponse;
