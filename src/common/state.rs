// Application state shared across all modules

use sqlx::SqlitePool;
use std::sync::Arc;

use crate::auth::{OtpEngine, TokenService};
use crate::services::{GoogleService, Mailer};

/// Environment-derived knobs that do not change after startup.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// Origin of the web frontend, used for CORS, OAuth redirects and
    /// the popup postMessage target.
    pub frontend_origin: String,
    /// OAuth redirect URL registered with Google for the callback route.
    pub oauth_redirect_url: String,
    /// Adds the Secure attribute to session cookies when true.
    pub production: bool,
}

/// Application state containing database pool, services, and configuration
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: AuthConfig,
    pub otp_engine: OtpEngine,
    pub token_service: Arc<TokenService>,
    pub google_service: Arc<GoogleService>,
    pub mailer: Arc<dyn Mailer>,
}
