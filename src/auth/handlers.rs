//! Authentication handlers
//!
//! The email flow walks one account through
//! `NO_ACCOUNT -> PENDING_VERIFICATION -> ACTIVE`; Google federation
//! jumps straight to `ACTIVE`. Every success that mints a session
//! returns the token in the JSON body and as an HttpOnly cookie.

use axum::extract::{Extension, Json, Query};
use axum::http::header::SET_COOKIE;
use axum::response::{Html, IntoResponse, Redirect, Response};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::extractors::AuthedUser;
use super::models::{
    AuthProvider, CallbackMode, GoogleStartRequest, GoogleTokenRequest, LoginEmailRequest,
    PublicUser, SignupEmailRequest, User, VerifyOtpRequest,
};
use super::session::{clear_session_cookie, session_cookie};
use super::store::{self, NewUser};
use super::validators::AuthValidator;
use crate::common::{safe_email_log, safe_token_log, ApiError, AppState, Validator};
use crate::services::{GoogleError, GoogleIdentity};

/// GET /api/health
///
/// # Response
/// ```json
/// {
///   "status": "OK",
///   "timestamp": "2025-01-01T00:00:00Z"
/// }
/// ```
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "OK",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Fallback for unmatched routes so the error envelope stays consistent
pub async fn not_found_handler() -> ApiError {
    ApiError::NotFound("Route not found".to_string())
}

/// POST /api/auth/signup-email
/// Registers an email-provider account and dispatches a verification code
///
/// # Request Body
/// ```json
/// {
///   "email": "user@example.com",
///   "name": "Jane Doe",
///   "dateOfBirth": "1990-01-01"
/// }
/// ```
///
/// # Response
/// ```json
/// {
///   "message": "OTP sent successfully"
/// }
/// ```
pub async fn signup_email(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<SignupEmailRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    info!(
        email = %safe_email_log(&request.email),
        "📧 Received email signup request"
    );

    let validator = AuthValidator;
    let validation_result = validator.validate(&request);
    if !validation_result.is_valid {
        return Err(ApiError::from(validation_result));
    }

    // A finished account blocks the email; an unfinished signup is
    // replaced wholesale, cascade taking its codes along.
    if let Some(existing) = store::find_user_by_email(&state.db, &request.email)
        .await
        .map_err(ApiError::DatabaseError)?
    {
        if existing.is_active {
            warn!(
                user_id = %existing.id,
                "Signup rejected: account already active"
            );
            return Err(ApiError::UserExists("User already exists".to_string()));
        }

        debug!(user_id = %existing.id, "Replacing pending signup");
        store::delete_user(&state.db, &existing.id)
            .await
            .map_err(ApiError::DatabaseError)?;
    }

    let user = match store::insert_user(
        &state.db,
        NewUser {
            email: &request.email,
            name: &request.name,
            date_of_birth: request.date_of_birth.as_deref(),
            provider: AuthProvider::Email,
            google_id: None,
            is_active: false,
        },
    )
    .await
    {
        Ok(u) => u,
        Err(e) if store::is_unique_violation(&e) => {
            // Lost the insert race against a concurrent signup
            warn!(
                email = %safe_email_log(&request.email),
                "Signup rejected: concurrent registration won"
            );
            return Err(ApiError::UserExists("User already exists".to_string()));
        }
        Err(e) => {
            error!(
                error = %e,
                email = %safe_email_log(&request.email),
                "Database error inserting user during signup"
            );
            return Err(ApiError::DatabaseError(e));
        }
    };

    issue_otp(&state, &user).await?;

    info!(
        user_id = %user.id,
        email = %safe_email_log(&user.email),
        "👤 New signup pending verification"
    );

    Ok(Json(serde_json::json!({
        "message": "OTP sent successfully"
    })))
}

/// POST /api/auth/verify-otp
/// Checks a submitted code, activates the account and mints a session
///
/// # Request Body
/// ```json
/// {
///   "email": "user@example.com",
///   "otp": "042357"
/// }
/// ```
///
/// # Response
/// ```json
/// {
///   "token": "<jwt token>",
///   "user": { ... }
/// }
/// ```
pub async fn verify_otp(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<VerifyOtpRequest>,
) -> Result<Response, ApiError> {
    info!(
        email = %safe_email_log(&request.email),
        "🔑 Received OTP verification request"
    );

    let validator = AuthValidator;
    let validation_result = validator.validate(&request);
    if !validation_result.is_valid {
        return Err(ApiError::from(validation_result));
    }

    let user = store::find_user_by_email(&state.db, &request.email)
        .await
        .map_err(ApiError::DatabaseError)?
        .ok_or_else(|| ApiError::UserNotFound("User not found".to_string()))?;

    let record = store::find_otp_by_user(&state.db, &user.id)
        .await
        .map_err(ApiError::DatabaseError)?
        .ok_or_else(|| ApiError::OtpNotFound("OTP not found or expired".to_string()))?;

    if state.otp_engine.is_expired(record.expires_at) {
        store::delete_otp(&state.db, &record.id)
            .await
            .map_err(ApiError::DatabaseError)?;
        warn!(user_id = %user.id, "Verification code expired");
        return Err(ApiError::OtpExpired("OTP has expired".to_string()));
    }

    if record.attempts >= state.otp_engine.max_attempts {
        store::delete_otp(&state.db, &record.id)
            .await
            .map_err(ApiError::DatabaseError)?;
        warn!(
            user_id = %user.id,
            attempts = record.attempts,
            "Verification attempts exhausted, code burned"
        );
        return Err(ApiError::OtpMaxAttempts("Too many OTP attempts".to_string()));
    }

    if !state.otp_engine.verify(&request.otp, &record.code_hash) {
        // The record survives a mismatch; only the counter moves
        store::increment_otp_attempts(&state.db, &record.id)
            .await
            .map_err(ApiError::DatabaseError)?;
        warn!(
            user_id = %user.id,
            attempts = record.attempts + 1,
            "Verification code mismatch"
        );
        return Err(ApiError::InvalidOtp("Invalid OTP".to_string()));
    }

    store::activate_user(&state.db, &user.id)
        .await
        .map_err(ApiError::DatabaseError)?;
    store::delete_otp(&state.db, &record.id)
        .await
        .map_err(ApiError::DatabaseError)?;

    let token = state.token_service.issue(&user)?;

    info!(
        user_id = %user.id,
        email = %safe_email_log(&user.email),
        "✅ User verified, session issued"
    );

    session_response(&state, token, &user)
}

/// POST /api/auth/login-email
/// Sends a fresh login code to an activated email-provider account
///
/// # Request Body
/// ```json
/// {
///   "email": "user@example.com"
/// }
/// ```
///
/// # Response
/// ```json
/// {
///   "message": "OTP sent successfully"
/// }
/// ```
pub async fn login_email(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<LoginEmailRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    info!(
        email = %safe_email_log(&request.email),
        "📧 Received email login request"
    );

    let validator = AuthValidator;
    let validation_result = validator.validate(&request);
    if !validation_result.is_valid {
        return Err(ApiError::from(validation_result));
    }

    // Federated accounts never hold codes; they look the same as
    // unknown emails from outside.
    let user = store::find_user_by_email(&state.db, &request.email)
        .await
        .map_err(ApiError::DatabaseError)?
        .filter(|u| u.provider == AuthProvider::Email)
        .ok_or_else(|| ApiError::UserNotFound("User not found".to_string()))?;

    if !user.is_active {
        warn!(user_id = %user.id, "Login rejected: account not activated");
        return Err(ApiError::AccountInactive(
            "Account not activated".to_string(),
        ));
    }

    issue_otp(&state, &user).await?;

    info!(user_id = %user.id, "Login code sent");

    Ok(Json(serde_json::json!({
        "message": "OTP sent successfully"
    })))
}

/// POST /api/auth/google
/// Authenticates a user via a one-shot Google ID token assertion
///
/// # Request Body
/// ```json
/// {
///   "token": "<google id token>"
/// }
/// ```
///
/// # Response
/// ```json
/// {
///   "token": "<jwt token>",
///   "user": { ... }
/// }
/// ```
pub async fn google_auth(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<GoogleTokenRequest>,
) -> Result<Response, ApiError> {
    info!("🔐 Received Google auth request");

    let identity = state
        .google_service
        .verify_id_token(&request.token)
        .await
        .map_err(google_error)?;

    let user = federate_google_identity(&state, identity).await?;
    let token = state.token_service.issue(&user)?;

    info!(
        user_id = %user.id,
        email = %safe_email_log(&user.email),
        provider = "google",
        "✅ User authentication successful via Google"
    );

    session_response(&state, token, &user)
}

/// POST /api/auth/google/start
/// Hands the frontend the Google consent URL to open
///
/// # Request Body
/// ```json
/// {
///   "mode": "popup"
/// }
/// ```
///
/// # Response
/// ```json
/// {
///   "redirectUrl": "https://accounts.google.com/o/oauth2/v2/auth?..."
/// }
/// ```
pub async fn google_start(
    Extension(state): Extension<Arc<AppState>>,
    payload: Option<Json<GoogleStartRequest>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    // The delivery mode rides the OAuth state parameter to the callback
    let mode = payload.and_then(|Json(r)| r.mode).unwrap_or_default();

    info!(mode = mode.as_str(), "Starting Google OAuth flow");

    let redirect_url = state
        .google_service
        .authorization_url(&state.config.oauth_redirect_url, mode.as_str())
        .map_err(google_error)?;

    Ok(Json(serde_json::json!({ "redirectUrl": redirect_url })))
}

/// GET /api/auth/google/callback
/// Completes the code flow: exchanges the code, verifies the identity
/// and hands the session to the frontend, either through the opener
/// popup or a top-level redirect depending on the state parameter.
pub async fn google_callback(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    if let Some(error) = params.get("error") {
        warn!(oauth_error = %error, "Google OAuth returned an error");
        return Err(ApiError::Unauthorized("OAuth Failed".to_string()));
    }

    let code = params.get("code").ok_or_else(|| {
        warn!("OAuth callback missing authorization code");
        ApiError::BadRequest("Authorization code not provided".to_string())
    })?;

    let mode = CallbackMode::from_state(params.get("state").map(String::as_str));

    info!(mode = mode.as_str(), "Received Google OAuth callback");

    let tokens = state
        .google_service
        .exchange_code(code, &state.config.oauth_redirect_url)
        .await
        .map_err(google_error)?;

    let id_token = tokens.id_token.as_deref().ok_or_else(|| {
        warn!("Token exchange response carried no id_token");
        ApiError::Unauthorized("OAuth Failed".to_string())
    })?;

    // The exchanged ID token goes through the same verification as the
    // one-shot path
    let identity = state
        .google_service
        .verify_id_token(id_token)
        .await
        .map_err(google_error)?;

    let user = federate_google_identity(&state, identity).await?;
    let token = state.token_service.issue(&user)?;

    info!(
        user_id = %user.id,
        email = %safe_email_log(&user.email),
        provider = "google",
        "✅ User authentication successful via OAuth callback"
    );

    match mode {
        CallbackMode::Redirect => {
            let target = format!("{}/?token={}", state.config.frontend_origin, token);
            Ok(Redirect::to(&target).into_response())
        }
        CallbackMode::Popup => Ok(Html(popup_callback_html(
            &state.config.frontend_origin,
            &token,
            &user,
        ))
        .into_response()),
    }
}

/// GET /api/user/me
/// Returns the current authenticated user's profile
///
/// # Response
/// ```json
/// {
///   "user": { ... }
/// }
/// ```
#[axum::debug_handler]
pub async fn me_handler(
    Extension(state): Extension<Arc<AppState>>,
    authed: AuthedUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = store::find_user_by_id(&state.db, &authed.id)
        .await
        .map_err(ApiError::DatabaseError)?
        .ok_or_else(|| ApiError::Unauthorized("user not found".to_string()))?;

    Ok(Json(serde_json::json!({
        "user": PublicUser::from(&user)
    })))
}

/// POST /api/auth/logout
/// Drops the session cookie. The JWT itself stays valid until expiry,
/// there is no server-side revocation list.
///
/// # Response
/// ```json
/// {
///   "message": "Logged out successfully"
/// }
/// ```
pub async fn logout_handler(
    Extension(state): Extension<Arc<AppState>>,
    authed: AuthedUser,
) -> Result<Response, ApiError> {
    info!(
        user_id = %authed.id,
        email = %safe_email_log(&authed.email),
        provider = %authed.provider.as_str(),
        "User logout"
    );

    let cookie = clear_session_cookie(state.config.production).map_err(|e| {
        error!(error = %e, "Failed to build clearing cookie");
        ApiError::InternalServer("cookie error".to_string())
    })?;

    let body = Json(serde_json::json!({
        "message": "Logged out successfully"
    }));

    Ok(([(SET_COOKIE, cookie)], body).into_response())
}

// ---- Helper Functions ----

/// Generate, persist and dispatch a fresh verification code. Prior
/// codes for the user are wiped first so at most one can be live.
async fn issue_otp(state: &AppState, user: &User) -> Result<(), ApiError> {
    let swept = store::delete_expired_otps(&state.db)
        .await
        .map_err(ApiError::DatabaseError)?;
    if swept > 0 {
        debug!(swept = swept, "Pruned expired verification codes");
    }

    store::delete_otps_for_user(&state.db, &user.id)
        .await
        .map_err(ApiError::DatabaseError)?;

    let code = state.otp_engine.generate();
    let code_hash = state.otp_engine.hash(&code).map_err(|e| {
        error!(error = %e, user_id = %user.id, "Failed to hash verification code");
        ApiError::InternalServer("hash error".to_string())
    })?;
    let expires_at = state.otp_engine.expiry_at(Utc::now());

    store::insert_otp(&state.db, &user.id, &code_hash, expires_at)
        .await
        .map_err(ApiError::DatabaseError)?;

    // A user left without their code can retry signup or login, so the
    // record staying behind is harmless.
    if let Err(e) = state
        .mailer
        .send_otp_email(&user.email, &user.name, &code)
        .await
    {
        error!(
            error = %e,
            user_id = %user.id,
            email = %safe_email_log(&user.email),
            "Failed to send OTP email"
        );
        return Err(ApiError::EmailError("Failed to send OTP email".to_string()));
    }

    debug!(user_id = %user.id, expires_at = %expires_at, "Verification code issued");
    Ok(())
}

/// Find-or-create for a verified Google identity. The provider field is
/// immutable once set, so an email-provider account under the same
/// address is a conflict rather than a merge.
pub(super) async fn federate_google_identity(
    state: &AppState,
    identity: GoogleIdentity,
) -> Result<User, ApiError> {
    let email = identity
        .email
        .clone()
        .filter(|_| identity.email_verified)
        .ok_or_else(|| {
            warn!(
                has_email = identity.email.is_some(),
                email_verified = identity.email_verified,
                "Google assertion missing a verified email claim"
            );
            ApiError::BadGateway("Email not provided by Google".to_string())
        })?;

    let existing = store::find_user_by_email(&state.db, &email)
        .await
        .map_err(ApiError::DatabaseError)?;

    match existing {
        Some(user) => {
            if user.provider != AuthProvider::Google {
                warn!(
                    user_id = %user.id,
                    provider = %user.provider.as_str(),
                    "Federation rejected: email registered with another provider"
                );
                return Err(ApiError::ProviderMismatch(
                    "Email already registered with different provider".to_string(),
                ));
            }

            if !user.is_active {
                // Provider-attested accounts come back without re-verification
                store::activate_user(&state.db, &user.id)
                    .await
                    .map_err(ApiError::DatabaseError)?;
                info!(user_id = %user.id, "Reactivated Google account");
                return store::find_user_by_id(&state.db, &user.id)
                    .await
                    .map_err(ApiError::DatabaseError)?
                    .ok_or_else(|| ApiError::InternalServer("user vanished".to_string()));
            }

            debug!(user_id = %user.id, "Found existing Google account");
            Ok(user)
        }
        None => {
            let name = identity
                .name
                .clone()
                .unwrap_or_else(|| email.split('@').next().unwrap_or(&email).to_string());

            let inserted = store::insert_user(
                &state.db,
                NewUser {
                    email: &email,
                    name: &name,
                    date_of_birth: None,
                    provider: AuthProvider::Google,
                    google_id: Some(&identity.subject),
                    is_active: true,
                },
            )
            .await;

            match inserted {
                Ok(user) => {
                    info!(
                        user_id = %user.id,
                        email = %safe_email_log(&user.email),
                        "👤 Created user account via Google federation"
                    );
                    Ok(user)
                }
                Err(e) if store::is_unique_violation(&e) => {
                    // Concurrent federation of the same identity; adopt
                    // the winner's row
                    let user = store::find_user_by_email(&state.db, &email)
                        .await
                        .map_err(ApiError::DatabaseError)?
                        .ok_or_else(|| ApiError::InternalServer("user vanished".to_string()))?;
                    if user.provider != AuthProvider::Google {
                        return Err(ApiError::ProviderMismatch(
                            "Email already registered with different provider".to_string(),
                        ));
                    }
                    Ok(user)
                }
                Err(e) => {
                    error!(
                        error = %e,
                        email = %safe_email_log(&email),
                        "Database error inserting user during federation"
                    );
                    Err(ApiError::DatabaseError(e))
                }
            }
        }
    }
}

/// Map federator failures onto the boundary contract: absent
/// credentials are a service condition, everything else reads as a
/// rejected login.
fn google_error(err: GoogleError) -> ApiError {
    match err {
        GoogleError::NotConfigured => {
            warn!("Google sign-in attempted without configured credentials");
            ApiError::NotConfigured("Google sign-in is not configured".to_string())
        }
        other => {
            warn!(error = %other, "Google identity verification failed");
            ApiError::Unauthorized("Invalid Google token".to_string())
        }
    }
}

/// 200 response carrying the session both ways: JSON body and cookie.
fn session_response(state: &AppState, token: String, user: &User) -> Result<Response, ApiError> {
    debug!(
        user_id = %user.id,
        token = %safe_token_log(&token),
        "Session token issued"
    );

    let cookie = session_cookie(
        &token,
        state.token_service.ttl_seconds(),
        state.config.production,
    )
    .map_err(|e| {
        error!(error = %e, "Failed to build session cookie");
        ApiError::InternalServer("cookie error".to_string())
    })?;

    let body = Json(serde_json::json!({
        "token": token,
        "user": PublicUser::from(user),
    }));

    Ok(([(SET_COOKIE, cookie)], body).into_response())
}

/// Page served to the OAuth popup: posts the session to the opener,
/// targeted at the frontend origin only, then closes itself.
pub(super) fn popup_callback_html(frontend_origin: &str, token: &str, user: &User) -> String {
    // JSON-encoding doubles as JS string escaping, except `<` which
    // serde_json leaves alone; encode it so no embedded value can close
    // the script block early
    let payload = serde_json::json!({
        "type": "GOOGLE_AUTH_SUCCESS",
        "data": {
            "token": token,
            "user": PublicUser::from(user),
        },
    })
    .to_string()
    .replace('<', "\\u003c");
    let target = serde_json::json!(frontend_origin)
        .to_string()
        .replace('<', "\\u003c");

    format!(
        r#"<!DOCTYPE html>
<html>
  <head>
    <title>Authentication Complete</title>
  </head>
  <body>
    <script>
      if (window.opener) {{
        window.opener.postMessage({payload}, {target});
      }}
      window.close();
    </script>
  </body>
</html>
"#
    )
}
