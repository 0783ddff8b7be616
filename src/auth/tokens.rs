//! Session token issue and verification

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use tracing::{error, warn};

use super::models::{Claims, User};
use crate::common::ApiError;

/// Signs and validates the HS256 session tokens. Holds the prepared
/// keys; the secret is read once at startup and the binary refuses to
/// serve without one.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_days: i64,
}

impl TokenService {
    pub fn new(secret: &str, ttl_days: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl_days,
        }
    }

    /// Lifetime shared by the exp claim and the cookie Max-Age, so both
    /// deliveries of the same token expire together.
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_days * 24 * 60 * 60
    }

    /// Sign a session token for a user.
    pub fn issue(&self, user: &User) -> Result<String, ApiError> {
        let exp = (Utc::now() + Duration::days(self.ttl_days)).timestamp() as usize;
        let claims = Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            provider: user.provider,
            exp,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| {
            error!(error = %e, user_id = %user.id, "JWT encoding error");
            ApiError::InternalServer("jwt error".to_string())
        })
    }

    /// Decode and validate a presented token. Bad signature, malformed
    /// input and expiry all collapse to Unauthorized.
    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(token, &self.decoding_key, &Validation::new(Algorithm::HS256))
            .map(|data| data.claims)
            .map_err(|e| {
                warn!(error = %e, "JWT validation failed");
                ApiError::Unauthorized("Invalid or expired token".to_string())
            })
    }
}
