//! Tests for auth module
//!
//! Scenario tests that walk accounts through the signup, verification,
//! login and federation flows against an in-memory database, plus
//! token service and validator checks.

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::extract::{Extension, FromRequestParts, Json, Query};
    use axum::http::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
    use axum::http::{HeaderValue, Request, StatusCode};
    use chrono::{Duration, Utc};
    use sqlx::sqlite::SqlitePoolOptions;

    use super::super::extractors::AuthedUser;
    use super::super::handlers;
    use super::super::models::{
        AuthProvider, CallbackMode, LoginEmailRequest, SignupEmailRequest, User, VerifyOtpRequest,
    };
    use super::super::otp::OtpEngine;
    use super::super::store::{self, NewUser};
    use super::super::tokens::TokenService;
    use super::super::validators::AuthValidator;
    use crate::common::migrations::run_migrations;
    use crate::common::{ApiError, AppState, AuthConfig, Validator};
    use crate::services::{GoogleIdentity, GoogleService, MailError, Mailer};

    /// Mailer that records dispatches instead of sending, with a
    /// switchable failure mode.
    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<(String, String, String)>>,
        fail: AtomicBool,
    }

    impl RecordingMailer {
        fn last_code(&self) -> Option<String> {
            self.sent
                .lock()
                .unwrap()
                .last()
                .map(|(_, _, code)| code.clone())
        }

        fn sent_count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }

        fn set_failing(&self, failing: bool) {
            self.fail.store(failing, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send_otp_email(&self, to: &str, name: &str, code: &str) -> Result<(), MailError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(MailError::SendFailed("smtp down".to_string()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), name.to_string(), code.to_string()));
            Ok(())
        }
    }

    async fn setup_state(mailer: Arc<RecordingMailer>) -> Arc<AppState> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create test database");

        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&pool)
            .await
            .expect("Failed to enable foreign keys");

        run_migrations(&pool).await.expect("Failed to run migrations");

        Arc::new(AppState {
            db: pool,
            config: AuthConfig {
                frontend_origin: "http://localhost:5173".to_string(),
                oauth_redirect_url: "http://localhost:8080/api/auth/google/callback".to_string(),
                production: false,
            },
            // Minimum bcrypt cost keeps the suite fast
            otp_engine: OtpEngine::new(10, 4, 5),
            token_service: Arc::new(TokenService::new("test_secret_key", 7)),
            google_service: Arc::new(GoogleService::new(None, None)),
            mailer,
        })
    }

    fn signup_request(email: &str) -> SignupEmailRequest {
        SignupEmailRequest {
            email: email.to_string(),
            name: "Test User".to_string(),
            date_of_birth: Some("1990-01-01".to_string()),
        }
    }

    fn verify_request(email: &str, otp: &str) -> VerifyOtpRequest {
        VerifyOtpRequest {
            email: email.to_string(),
            otp: otp.to_string(),
        }
    }

    fn login_request(email: &str) -> LoginEmailRequest {
        LoginEmailRequest {
            email: email.to_string(),
        }
    }

    /// A code guaranteed to differ from the given one.
    fn wrong_code(code: &str) -> String {
        if code == "000000" {
            "000001".to_string()
        } else {
            "000000".to_string()
        }
    }

    fn google_identity(email: &str) -> GoogleIdentity {
        GoogleIdentity {
            subject: "google-subject-1".to_string(),
            email: Some(email.to_string()),
            email_verified: true,
            name: Some("Google User".to_string()),
        }
    }

    fn sample_user() -> User {
        User {
            id: "U_TEST01".to_string(),
            email: "token@example.com".to_string(),
            name: "Token User".to_string(),
            date_of_birth: None,
            provider: AuthProvider::Email,
            google_id: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// Request parts carrying the shared state, shaped the way the
    /// router hands them to the extractor.
    fn request_parts(state: &Arc<AppState>) -> axum::http::request::Parts {
        let (mut parts, _) = Request::builder()
            .uri("/api/user/me")
            .body(())
            .expect("request should build")
            .into_parts();
        parts.extensions.insert(state.clone());
        parts
    }

    async fn active_user_with_token(state: &Arc<AppState>, email: &str) -> (User, String) {
        let user = store::insert_user(
            &state.db,
            NewUser {
                email,
                name: "Session User",
                date_of_birth: None,
                provider: AuthProvider::Email,
                google_id: None,
                is_active: true,
            },
        )
        .await
        .expect("user should insert");
        let token = state
            .token_service
            .issue(&user)
            .expect("token should issue");
        (user, token)
    }

    #[tokio::test]
    async fn test_health_check() {
        let Json(body) = handlers::health_check().await;
        assert_eq!(body["status"], "OK");
        assert!(body.get("timestamp").is_some());
    }

    #[tokio::test]
    async fn test_signup_verify_round_trip() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = setup_state(mailer.clone()).await;

        // Signup leaves the account pending and dispatches a code
        let Json(body) = handlers::signup_email(
            Extension(state.clone()),
            Json(signup_request("flow@example.com")),
        )
        .await
        .expect("signup should succeed");
        assert_eq!(body["message"], "OTP sent successfully");

        let pending = store::find_user_by_email(&state.db, "flow@example.com")
            .await
            .unwrap()
            .expect("pending user should exist");
        assert!(!pending.is_active);
        assert_eq!(pending.provider, AuthProvider::Email);

        let code = mailer.last_code().expect("signup should dispatch a code");

        // A wrong code is rejected and the record survives
        let result = handlers::verify_otp(
            Extension(state.clone()),
            Json(verify_request("flow@example.com", &wrong_code(&code))),
        )
        .await;
        assert!(matches!(result, Err(ApiError::InvalidOtp(_))));

        // The right code activates the account and mints a session
        let response = handlers::verify_otp(
            Extension(state.clone()),
            Json(verify_request("flow@example.com", &code)),
        )
        .await
        .expect("verification should succeed");
        assert_eq!(response.status(), StatusCode::OK);

        let cookie = response
            .headers()
            .get(SET_COOKIE)
            .expect("session cookie should be set")
            .to_str()
            .unwrap();
        assert!(cookie.starts_with("token="));
        assert!(cookie.contains("HttpOnly"));

        let user = store::find_user_by_email(&state.db, "flow@example.com")
            .await
            .unwrap()
            .unwrap();
        assert!(user.is_active);
        assert!(store::find_otp_by_user(&state.db, &user.id)
            .await
            .unwrap()
            .is_none());

        // The code is burned on success
        let result = handlers::verify_otp(
            Extension(state.clone()),
            Json(verify_request("flow@example.com", &code)),
        )
        .await;
        assert!(matches!(result, Err(ApiError::OtpNotFound(_))));
    }

    #[tokio::test]
    async fn test_signup_rejects_active_duplicate() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = setup_state(mailer.clone()).await;

        handlers::signup_email(
            Extension(state.clone()),
            Json(signup_request("dup@example.com")),
        )
        .await
        .expect("signup should succeed");
        let code = mailer.last_code().unwrap();
        handlers::verify_otp(
            Extension(state.clone()),
            Json(verify_request("dup@example.com", &code)),
        )
        .await
        .expect("verification should succeed");

        let result = handlers::signup_email(
            Extension(state.clone()),
            Json(signup_request("dup@example.com")),
        )
        .await;
        assert!(matches!(result, Err(ApiError::UserExists(_))));
    }

    #[tokio::test]
    async fn test_signup_replaces_pending_account() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = setup_state(mailer.clone()).await;

        handlers::signup_email(
            Extension(state.clone()),
            Json(signup_request("retry@example.com")),
        )
        .await
        .expect("first signup should succeed");
        let first_id = store::find_user_by_email(&state.db, "retry@example.com")
            .await
            .unwrap()
            .unwrap()
            .id;
        let first_code = mailer.last_code().unwrap();

        // Second signup for the same email replaces the pending account
        handlers::signup_email(
            Extension(state.clone()),
            Json(signup_request("retry@example.com")),
        )
        .await
        .expect("second signup should succeed");
        let second_id = store::find_user_by_email(&state.db, "retry@example.com")
            .await
            .unwrap()
            .unwrap()
            .id;
        let second_code = mailer.last_code().unwrap();

        assert_ne!(first_id, second_id);
        assert_eq!(mailer.sent_count(), 2);

        if first_code != second_code {
            let result = handlers::verify_otp(
                Extension(state.clone()),
                Json(verify_request("retry@example.com", &first_code)),
            )
            .await;
            assert!(matches!(result, Err(ApiError::InvalidOtp(_))));
        }

        handlers::verify_otp(
            Extension(state.clone()),
            Json(verify_request("retry@example.com", &second_code)),
        )
        .await
        .expect("second code should verify");
    }

    #[tokio::test]
    async fn test_verify_unknown_email() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = setup_state(mailer).await;

        let result = handlers::verify_otp(
            Extension(state.clone()),
            Json(verify_request("ghost@example.com", "123456")),
        )
        .await;
        assert!(matches!(result, Err(ApiError::UserNotFound(_))));
    }

    #[tokio::test]
    async fn test_attempt_exhaustion_burns_code() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = setup_state(mailer.clone()).await;

        handlers::signup_email(
            Extension(state.clone()),
            Json(signup_request("limit@example.com")),
        )
        .await
        .expect("signup should succeed");
        let code = mailer.last_code().unwrap();
        let bad = wrong_code(&code);

        // Five wrong guesses consume the attempt budget
        for _ in 0..5 {
            let result = handlers::verify_otp(
                Extension(state.clone()),
                Json(verify_request("limit@example.com", &bad)),
            )
            .await;
            assert!(matches!(result, Err(ApiError::InvalidOtp(_))));
        }

        // The sixth submission burns the record
        let result = handlers::verify_otp(
            Extension(state.clone()),
            Json(verify_request("limit@example.com", &bad)),
        )
        .await;
        assert!(matches!(result, Err(ApiError::OtpMaxAttempts(_))));

        // Even the right code is gone now
        let result = handlers::verify_otp(
            Extension(state.clone()),
            Json(verify_request("limit@example.com", &code)),
        )
        .await;
        assert!(matches!(result, Err(ApiError::OtpNotFound(_))));
    }

    #[tokio::test]
    async fn test_expired_code_is_burned_on_contact() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = setup_state(mailer).await;

        let user = store::insert_user(
            &state.db,
            NewUser {
                email: "stale@example.com",
                name: "Stale",
                date_of_birth: None,
                provider: AuthProvider::Email,
                google_id: None,
                is_active: false,
            },
        )
        .await
        .unwrap();
        let digest = state.otp_engine.hash("123456").unwrap();
        store::insert_otp(&state.db, &user.id, &digest, Utc::now() - Duration::minutes(1))
            .await
            .unwrap();

        let result = handlers::verify_otp(
            Extension(state.clone()),
            Json(verify_request("stale@example.com", "123456")),
        )
        .await;
        assert!(matches!(result, Err(ApiError::OtpExpired(_))));

        // The expired record was deleted, not just rejected
        let result = handlers::verify_otp(
            Extension(state.clone()),
            Json(verify_request("stale@example.com", "123456")),
        )
        .await;
        assert!(matches!(result, Err(ApiError::OtpNotFound(_))));
    }

    #[tokio::test]
    async fn test_login_requires_active_email_account() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = setup_state(mailer.clone()).await;

        // Unknown email
        let result = handlers::login_email(
            Extension(state.clone()),
            Json(login_request("nobody@example.com")),
        )
        .await;
        assert!(matches!(result, Err(ApiError::UserNotFound(_))));

        // Pending signup cannot log in yet
        handlers::signup_email(
            Extension(state.clone()),
            Json(signup_request("pending@example.com")),
        )
        .await
        .expect("signup should succeed");
        let result = handlers::login_email(
            Extension(state.clone()),
            Json(login_request("pending@example.com")),
        )
        .await;
        assert!(matches!(result, Err(ApiError::AccountInactive(_))));

        // Federated accounts hold no codes and look like unknown emails
        handlers::federate_google_identity(&state, google_identity("fed@example.com"))
            .await
            .expect("federation should succeed");
        let result = handlers::login_email(
            Extension(state.clone()),
            Json(login_request("fed@example.com")),
        )
        .await;
        assert!(matches!(result, Err(ApiError::UserNotFound(_))));
    }

    #[tokio::test]
    async fn test_login_reissues_over_stale_code() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = setup_state(mailer.clone()).await;

        handlers::signup_email(
            Extension(state.clone()),
            Json(signup_request("again@example.com")),
        )
        .await
        .expect("signup should succeed");
        let code = mailer.last_code().unwrap();
        handlers::verify_otp(
            Extension(state.clone()),
            Json(verify_request("again@example.com", &code)),
        )
        .await
        .expect("verification should succeed");

        handlers::login_email(
            Extension(state.clone()),
            Json(login_request("again@example.com")),
        )
        .await
        .expect("first login should succeed");
        let first_login_code = mailer.last_code().unwrap();

        handlers::login_email(
            Extension(state.clone()),
            Json(login_request("again@example.com")),
        )
        .await
        .expect("second login should succeed");
        let second_login_code = mailer.last_code().unwrap();

        // Only the newest code is live
        if first_login_code != second_login_code {
            let result = handlers::verify_otp(
                Extension(state.clone()),
                Json(verify_request("again@example.com", &first_login_code)),
            )
            .await;
            assert!(matches!(result, Err(ApiError::InvalidOtp(_))));
        }

        let response = handlers::verify_otp(
            Extension(state.clone()),
            Json(verify_request("again@example.com", &second_login_code)),
        )
        .await
        .expect("newest code should verify");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_mail_failure_leaves_signup_pending() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = setup_state(mailer.clone()).await;

        mailer.set_failing(true);
        let result = handlers::signup_email(
            Extension(state.clone()),
            Json(signup_request("undelivered@example.com")),
        )
        .await;
        assert!(matches!(result, Err(ApiError::EmailError(_))));

        // The pending account stays so the user can retry
        let user = store::find_user_by_email(&state.db, "undelivered@example.com")
            .await
            .unwrap()
            .expect("pending user should survive mail failure");
        assert!(!user.is_active);

        mailer.set_failing(false);
        handlers::signup_email(
            Extension(state.clone()),
            Json(signup_request("undelivered@example.com")),
        )
        .await
        .expect("retry should succeed");
        let code = mailer.last_code().unwrap();
        handlers::verify_otp(
            Extension(state.clone()),
            Json(verify_request("undelivered@example.com", &code)),
        )
        .await
        .expect("verification should succeed after retry");
    }

    #[tokio::test]
    async fn test_federation_creates_active_google_user() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = setup_state(mailer).await;

        let user = handlers::federate_google_identity(&state, google_identity("g@example.com"))
            .await
            .expect("federation should succeed");
        assert!(user.is_active);
        assert_eq!(user.provider, AuthProvider::Google);
        assert_eq!(user.google_id.as_deref(), Some("google-subject-1"));
        assert_eq!(user.name, "Google User");

        // Repeat federation resolves to the same account
        let again = handlers::federate_google_identity(&state, google_identity("g@example.com"))
            .await
            .expect("repeat federation should succeed");
        assert_eq!(again.id, user.id);
    }

    #[tokio::test]
    async fn test_federation_provider_mismatch() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = setup_state(mailer.clone()).await;

        handlers::signup_email(
            Extension(state.clone()),
            Json(signup_request("taken@example.com")),
        )
        .await
        .expect("signup should succeed");
        let code = mailer.last_code().unwrap();
        handlers::verify_otp(
            Extension(state.clone()),
            Json(verify_request("taken@example.com", &code)),
        )
        .await
        .expect("verification should succeed");

        let result =
            handlers::federate_google_identity(&state, google_identity("taken@example.com")).await;
        assert!(matches!(result, Err(ApiError::ProviderMismatch(_))));
    }

    #[tokio::test]
    async fn test_federation_requires_verified_email() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = setup_state(mailer).await;

        let mut no_email = google_identity("x@example.com");
        no_email.email = None;
        let result = handlers::federate_google_identity(&state, no_email).await;
        assert!(matches!(result, Err(ApiError::BadGateway(_))));

        let mut unverified = google_identity("x@example.com");
        unverified.email_verified = false;
        let result = handlers::federate_google_identity(&state, unverified).await;
        assert!(matches!(result, Err(ApiError::BadGateway(_))));
    }

    #[tokio::test]
    async fn test_federation_defaults_name_from_email() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = setup_state(mailer).await;

        let mut identity = google_identity("nameless@example.com");
        identity.name = None;
        let user = handlers::federate_google_identity(&state, identity)
            .await
            .expect("federation should succeed");
        assert_eq!(user.name, "nameless");
    }

    #[tokio::test]
    async fn test_google_start_requires_configuration() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = setup_state(mailer).await;

        let result = handlers::google_start(Extension(state.clone()), None).await;
        assert!(matches!(result, Err(ApiError::NotConfigured(_))));
    }

    #[tokio::test]
    async fn test_callback_rejects_provider_error_and_missing_code() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = setup_state(mailer).await;

        let mut params = HashMap::new();
        params.insert("error".to_string(), "access_denied".to_string());
        let result = handlers::google_callback(Extension(state.clone()), Query(params)).await;
        assert!(matches!(result, Err(ApiError::Unauthorized(_))));

        let result =
            handlers::google_callback(Extension(state.clone()), Query(HashMap::new())).await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_me_returns_public_profile() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = setup_state(mailer).await;

        let user = store::insert_user(
            &state.db,
            NewUser {
                email: "me@example.com",
                name: "Me",
                date_of_birth: None,
                provider: AuthProvider::Email,
                google_id: None,
                is_active: true,
            },
        )
        .await
        .unwrap();

        let authed = AuthedUser {
            id: user.id.clone(),
            email: user.email.clone(),
            provider: user.provider,
        };
        let Json(body) = handlers::me_handler(Extension(state.clone()), authed)
            .await
            .expect("me should succeed");

        assert_eq!(body["user"]["email"], "me@example.com");
        assert_eq!(body["user"]["provider"], "email");
        // Server-side fields stay hidden
        assert!(body["user"].get("isActive").is_none());
        assert!(body["user"].get("googleId").is_none());
    }

    #[tokio::test]
    async fn test_logout_clears_cookie() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = setup_state(mailer).await;

        let user = store::insert_user(
            &state.db,
            NewUser {
                email: "bye@example.com",
                name: "Bye",
                date_of_birth: None,
                provider: AuthProvider::Email,
                google_id: None,
                is_active: true,
            },
        )
        .await
        .unwrap();

        let authed = AuthedUser {
            id: user.id,
            email: user.email,
            provider: user.provider,
        };
        let response = handlers::logout_handler(Extension(state.clone()), authed)
            .await
            .expect("logout should succeed");
        assert_eq!(response.status(), StatusCode::OK);

        let cookie = response
            .headers()
            .get(SET_COOKIE)
            .expect("clearing cookie should be set")
            .to_str()
            .unwrap();
        assert!(cookie.starts_with("token=;"));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn test_extractor_rejects_missing_and_garbage_tokens() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = setup_state(mailer).await;

        // No bearer header and no cookie
        let mut parts = request_parts(&state);
        let result = AuthedUser::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(ApiError::Unauthorized(_))));

        // A token that never was a JWT
        let mut parts = request_parts(&state);
        parts
            .headers
            .insert(AUTHORIZATION, HeaderValue::from_static("Bearer not-a-jwt"));
        let result = AuthedUser::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(ApiError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_extractor_resolves_active_user() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = setup_state(mailer).await;
        let (user, token) = active_user_with_token(&state, "live@example.com").await;

        let mut parts = request_parts(&state);
        parts.headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        let authed = AuthedUser::from_request_parts(&mut parts, &())
            .await
            .expect("active user should authenticate");

        assert_eq!(authed.id, user.id);
        assert_eq!(authed.email, user.email);
        assert_eq!(authed.provider, AuthProvider::Email);
    }

    #[tokio::test]
    async fn test_extractor_prefers_bearer_over_cookie() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = setup_state(mailer).await;
        let (bearer_user, bearer_token) =
            active_user_with_token(&state, "header@example.com").await;
        let (cookie_user, cookie_token) =
            active_user_with_token(&state, "cookie@example.com").await;

        // The cookie alone carries a session
        let mut parts = request_parts(&state);
        parts.headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("token={}", cookie_token)).unwrap(),
        );
        let authed = AuthedUser::from_request_parts(&mut parts, &())
            .await
            .expect("cookie session should authenticate");
        assert_eq!(authed.id, cookie_user.id);

        // With both present the bearer header wins
        let mut parts = request_parts(&state);
        parts.headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", bearer_token)).unwrap(),
        );
        parts.headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("token={}", cookie_token)).unwrap(),
        );
        let authed = AuthedUser::from_request_parts(&mut parts, &())
            .await
            .expect("bearer session should authenticate");
        assert_eq!(authed.id, bearer_user.id);
    }

    #[tokio::test]
    async fn test_extractor_rejects_inactive_and_deleted_users() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = setup_state(mailer).await;

        // The token outlives the account being flipped inactive
        let (user, token) = active_user_with_token(&state, "flipped@example.com").await;
        sqlx::query("UPDATE users SET is_active = 0 WHERE id = ?")
            .bind(&user.id)
            .execute(&state.db)
            .await
            .unwrap();
        let mut parts = request_parts(&state);
        parts.headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        let result = AuthedUser::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(ApiError::Unauthorized(_))));

        // And the account being deleted outright
        let (user, token) = active_user_with_token(&state, "erased@example.com").await;
        store::delete_user(&state.db, &user.id).await.unwrap();
        let mut parts = request_parts(&state);
        parts.headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        let result = AuthedUser::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(ApiError::Unauthorized(_))));
    }

    #[test]
    fn test_popup_html_keeps_script_block_closed() {
        let mut user = sample_user();
        user.name = "x</script><script>alert(1)".to_string();

        let html = handlers::popup_callback_html("http://localhost:5173", "tok123", &user);

        assert!(!html.contains("</script><script>alert"));
        assert!(html.contains("\\u003c/script"));
        assert!(html.contains("GOOGLE_AUTH_SUCCESS"));
        assert!(html.contains("window.opener.postMessage"));
        assert!(html.contains("\"http://localhost:5173\""));
    }

    #[test]
    fn test_token_round_trip() {
        let service = TokenService::new("test_secret_key", 7);
        let user = sample_user();

        let token = service.issue(&user).expect("issue should succeed");
        let claims = service.verify(&token).expect("verify should succeed");

        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, user.email);
        assert_eq!(claims.provider, AuthProvider::Email);
        assert_eq!(service.ttl_seconds(), 7 * 24 * 60 * 60);
    }

    #[test]
    fn test_token_rejects_tampering_and_wrong_secret() {
        let service = TokenService::new("test_secret_key", 7);
        let token = service.issue(&sample_user()).expect("issue should succeed");

        // Flip one character of the payload segment
        let idx = token.find('.').unwrap() + 1;
        let mut tampered = token.clone().into_bytes();
        tampered[idx] = if tampered[idx] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(tampered).unwrap();
        assert!(service.verify(&tampered).is_err());

        let other = TokenService::new("other_secret_key", 7);
        assert!(other.verify(&token).is_err());

        assert!(service.verify("not-a-jwt").is_err());
    }

    #[test]
    fn test_token_expiry_rejected() {
        // Negative TTL issues an already-expired token
        let service = TokenService::new("test_secret_key", -1);
        let token = service.issue(&sample_user()).expect("issue should succeed");
        assert!(service.verify(&token).is_err());
    }

    #[test]
    fn test_signup_validation() {
        let validator = AuthValidator;

        assert!(validator.validate(&signup_request("ok@example.com")).is_valid);

        let bad_email = validator.validate(&signup_request("not-an-email"));
        assert!(!bad_email.is_valid);
        assert!(bad_email.errors.iter().any(|e| e.field == "email"));

        let mut no_name = signup_request("ok@example.com");
        no_name.name = "   ".to_string();
        let result = validator.validate(&no_name);
        assert!(result.errors.iter().any(|e| e.field == "name"));

        let mut long_name = signup_request("ok@example.com");
        long_name.name = "x".repeat(101);
        let result = validator.validate(&long_name);
        assert!(result.errors.iter().any(|e| e.field == "name"));

        let mut bad_dob = signup_request("ok@example.com");
        bad_dob.date_of_birth = Some("01/01/1990".to_string());
        let result = validator.validate(&bad_dob);
        assert!(result.errors.iter().any(|e| e.field == "dateOfBirth"));
    }

    #[test]
    fn test_otp_validation() {
        let validator = AuthValidator;

        assert!(validator
            .validate(&verify_request("ok@example.com", "123456"))
            .is_valid);
        assert!(!validator
            .validate(&verify_request("ok@example.com", "12345"))
            .is_valid);
        assert!(!validator
            .validate(&verify_request("ok@example.com", "12345a"))
            .is_valid);
        assert!(!validator
            .validate(&verify_request("no-at-sign", "123456"))
            .is_valid);
    }

    #[test]
    fn test_callback_mode_from_state() {
        assert_eq!(
            CallbackMode::from_state(Some("redirect")),
            CallbackMode::Redirect
        );
        assert_eq!(CallbackMode::from_state(Some("popup")), CallbackMode::Popup);
        assert_eq!(
            CallbackMode::from_state(Some("garbage")),
            CallbackMode::Popup
        );
        assert_eq!(CallbackMode::from_state(None), CallbackMode::Popup);
    }
}
