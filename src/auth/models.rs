//! Authentication data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Identity provider an account is bound to. Immutable once set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum AuthProvider {
    Email,
    Google,
}

impl AuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthProvider::Email => "email",
            AuthProvider::Google => "google",
        }
    }
}

/// JWT claims structure
#[derive(Serialize, Deserialize, Debug)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub provider: AuthProvider,
    pub exp: usize,
}

/// User database model
#[derive(FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub date_of_birth: Option<String>,
    pub provider: AuthProvider,
    pub google_id: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// OTP database model. Holds the bcrypt digest of the code, never the
/// code itself.
#[derive(FromRow, Debug, Clone)]
pub struct OtpRecord {
    pub id: String,
    pub user_id: String,
    pub code_hash: String,
    pub expires_at: DateTime<Utc>,
    pub attempts: i64,
    pub created_at: DateTime<Utc>,
}

/// Profile shape exposed to clients. Internal flags and the google
/// subject id stay server-side.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub date_of_birth: Option<String>,
    pub provider: AuthProvider,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            date_of_birth: user.date_of_birth.clone(),
            provider: user.provider,
            created_at: user.created_at,
        }
    }
}

/// POST /api/auth/signup-email request body
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SignupEmailRequest {
    pub email: String,
    pub name: String,
    pub date_of_birth: Option<String>,
}

/// POST /api/auth/verify-otp request body
#[derive(Deserialize, Debug)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp: String,
}

/// POST /api/auth/login-email request body
#[derive(Deserialize, Debug)]
pub struct LoginEmailRequest {
    pub email: String,
}

/// POST /api/auth/google request body: the ID token the web SDK hands
/// the frontend after one-shot sign-in.
#[derive(Deserialize)]
pub struct GoogleTokenRequest {
    pub token: String,
}

/// POST /api/auth/google/start request body
#[derive(Deserialize, Debug, Default)]
pub struct GoogleStartRequest {
    #[serde(default)]
    pub mode: Option<CallbackMode>,
}

/// How the OAuth callback hands the session back to the frontend.
/// Travels through the OAuth `state` parameter so one callback route
/// serves both frontend variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CallbackMode {
    /// Popup window posts the token to `window.opener` and closes.
    #[default]
    Popup,
    /// Top-level redirect back to the frontend with `?token=`.
    Redirect,
}

impl CallbackMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallbackMode::Popup => "popup",
            CallbackMode::Redirect => "redirect",
        }
    }

    /// Parse the mode out of the OAuth state parameter, defaulting to
    /// popup for absent or unrecognized values.
    pub fn from_state(state: Option<&str>) -> Self {
        match state {
            Some("redirect") => CallbackMode::Redirect,
            _ => CallbackMode::Popup,
        }
    }
}
