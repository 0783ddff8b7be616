//! # Auth Module
//!
//! This module handles all authentication-related functionality including:
//! - Email OTP signup and login
//! - Google sign-in (one-shot ID token and OAuth code flow)
//! - JWT session issue and validation, cookie plumbing
//! - AuthedUser extractor for protected routes

pub mod extractors;
pub mod handlers;
pub mod models;
pub mod otp;
pub mod routes;
pub mod session;
pub mod store;
pub mod tokens;
pub mod validators;

#[cfg(test)]
mod tests;

pub use extractors::AuthedUser;
pub use models::User;
pub use otp::OtpEngine;
pub use routes::auth_routes;
pub use tokens::TokenService;
