//! Authentication routes

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers;

/// Creates and returns the authentication router
///
/// # Routes
/// - `GET /api/health` - Liveness probe
/// - `POST /api/auth/signup-email` - Email signup, sends a verification code
/// - `POST /api/auth/verify-otp` - Code verification, activates and signs in
/// - `POST /api/auth/login-email` - Login code for an activated account
/// - `POST /api/auth/google` - One-shot Google ID token sign-in
/// - `POST /api/auth/google/start` - Google consent URL for the code flow
/// - `GET /api/auth/google/callback` - OAuth code exchange callback
/// - `POST /api/auth/logout` - Clears the session cookie
/// - `GET /api/user/me` - Current user profile
///
/// Unmatched routes fall through to a JSON `NOT_FOUND` response.
pub fn auth_routes() -> Router {
    Router::new()
        .route("/api/health", get(handlers::health_check))
        .route("/api/auth/signup-email", post(handlers::signup_email))
        .route("/api/auth/verify-otp", post(handlers::verify_otp))
        .route("/api/auth/login-email", post(handlers::login_email))
        .route("/api/auth/google", post(handlers::google_auth))
        .route("/api/auth/google/start", post(handlers::google_start))
        .route("/api/auth/google/callback", get(handlers::google_callback))
        .route("/api/auth/logout", post(handlers::logout_handler))
        .route("/api/user/me", get(handlers::me_handler))
        .fallback(handlers::not_found_handler)
}
