// src/services/mod.rs
//
// Shared services module containing outbound integrations
// used by the domain modules

pub mod email;
pub mod google;
pub mod mail;

// Re-export commonly used types for convenience
pub use google::{GoogleError, GoogleIdentity, GoogleService};
pub use mail::{LogMailer, MailError, Mailer, SesMailer};
