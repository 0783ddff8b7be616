//! Authentication extractors for Axum

use async_trait::async_trait;
use axum::{
    extract::{Extension, FromRequestParts},
    http::request::Parts,
};
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::models::AuthProvider;
use super::session::extract_session_token;
use super::store;
use crate::common::{safe_email_log, ApiError, AppState};

/// Authenticated user extractor
///
/// Resolves the session token (bearer header or session cookie) to a
/// live user row. Requests with no token, a bad token or a token whose
/// subject no longer exists or is inactive are rejected up front.
#[derive(Debug)]
pub struct AuthedUser {
    pub id: String,
    pub email: String,
    pub provider: AuthProvider,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Extract the Extension containing the AppState
        let Extension(app_state): Extension<Arc<AppState>> =
            Extension::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::InternalServer("missing app state".to_string()))?;

        let token = match extract_session_token(&parts.headers) {
            Some(t) => t,
            None => {
                warn!("Authentication failed: no bearer token or session cookie");
                return Err(ApiError::Unauthorized("missing auth".into()));
            }
        };

        let claims = app_state.token_service.verify(&token)?;

        // Look up user in database; the token alone is not enough since
        // the account may have been removed since it was issued.
        let user = store::find_user_by_id(&app_state.db, &claims.sub)
            .await
            .map_err(|e| {
                error!(
                    error = %e,
                    user_id = %claims.sub,
                    "Database error during user lookup in authentication"
                );
                ApiError::DatabaseError(e)
            })?;

        match user {
            Some(u) if u.is_active => {
                debug!(
                    user_id = %u.id,
                    email = %safe_email_log(&u.email),
                    provider = %u.provider.as_str(),
                    "User authentication successful via extractor"
                );
                Ok(AuthedUser {
                    id: u.id,
                    email: u.email,
                    provider: u.provider,
                })
            }
            Some(u) => {
                warn!(user_id = %u.id, "Authentication failed: account is inactive");
                Err(ApiError::Unauthorized("account inactive".into()))
            }
            None => {
                warn!(user_id = %claims.sub, "Authentication failed: user not found in database");
                Err(ApiError::Unauthorized("user not found".into()))
            }
        }
    }
}
