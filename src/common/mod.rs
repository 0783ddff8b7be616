// Common module - shared types and utilities across all modules

pub mod error;
pub mod helpers;
pub mod id_generator;
pub mod migrations;
pub mod state;
pub mod validation;

// Re-export commonly used types for convenience
pub use error::ApiError;
pub use helpers::{normalize_email, safe_email_log, safe_token_log};
pub use id_generator::*;
pub use state::{AppState, AuthConfig};
pub use validation::{ValidationError, ValidationResult, Validator};
