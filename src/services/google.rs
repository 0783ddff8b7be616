// src/services/google.rs
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Debug, Error)]
pub enum GoogleError {
    #[error("Google OAuth not configured")]
    NotConfigured,

    #[error("OAuth flow failed: {0}")]
    OAuthFailed(String),

    #[error("Invalid ID token: {0}")]
    InvalidToken(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Identity asserted by Google after ID-token verification.
#[derive(Debug, Clone)]
pub struct GoogleIdentity {
    pub subject: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub name: Option<String>,
}

/// Token endpoint response for the authorization-code exchange.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub id_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    pub token_type: String,
    pub scope: Option<String>,
}

/// Talks to Google's OAuth endpoints. Credentials come from the
/// environment at startup; without them every operation reports
/// NotConfigured instead of guessing.
#[derive(Debug, Clone)]
pub struct GoogleService {
    client_id: Option<String>,
    client_secret: Option<String>,
    client: Client,
}

impl GoogleService {
    pub fn new(client_id: Option<String>, client_secret: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client_id,
            client_secret,
            client,
        }
    }

    fn client_id(&self) -> Result<&str, GoogleError> {
        self.client_id.as_deref().ok_or(GoogleError::NotConfigured)
    }

    fn credentials(&self) -> Result<(&str, &str), GoogleError> {
        match (self.client_id.as_deref(), self.client_secret.as_deref()) {
            (Some(id), Some(secret)) => Ok((id, secret)),
            _ => Err(GoogleError::NotConfigured),
        }
    }

    /// Consent-screen URL for the redirect flow. `state` rides through
    /// Google untouched and comes back on the callback.
    pub fn authorization_url(
        &self,
        redirect_uri: &str,
        state: &str,
    ) -> Result<String, GoogleError> {
        let client_id = self.client_id()?;

        let scopes = ["openid", "email", "profile"].join(" ");

        let auth_url = format!(
            "https://accounts.google.com/o/oauth2/v2/auth?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent&state={}",
            urlencoding::encode(client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scopes),
            urlencoding::encode(state)
        );

        debug!("Generated Google OAuth authorization URL");
        Ok(auth_url)
    }

    /// Exchange an authorization code for tokens. The interesting field
    /// is id_token, which goes through verify_id_token next.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, GoogleError> {
        let (client_id, client_secret) = self.credentials()?;

        let params = [
            ("code", code),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ];

        debug!("Exchanging authorization code for tokens");

        let response = self
            .client
            .post("https://oauth2.googleapis.com/token")
            .form(&params)
            .send()
            .await
            .map_err(|e| GoogleError::RequestFailed(e.to_string()))?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = %status, error = %error_text, "Token exchange failed");
            return Err(GoogleError::OAuthFailed(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| GoogleError::SerializationError(e.to_string()))
    }

    /// Verify an ID token against Google's tokeninfo endpoint and pull
    /// out the identity claims. Google checks the signature; expiry and
    /// audience are checked here.
    /// Docs: https://developers.google.com/identity/sign-in/web/backend-auth
    pub async fn verify_id_token(&self, id_token: &str) -> Result<GoogleIdentity, GoogleError> {
        let client_id = self.client_id()?;

        let tokeninfo_url = format!(
            "https://oauth2.googleapis.com/tokeninfo?id_token={}",
            urlencoding::encode(id_token)
        );

        debug!("Validating ID token with Google tokeninfo endpoint");

        let response = self.client.get(&tokeninfo_url).send().await.map_err(|e| {
            error!(error = %e, "HTTP error contacting Google tokeninfo endpoint");
            GoogleError::RequestFailed(e.to_string())
        })?;

        let status = response.status();
        debug!(http_status = %status, "Received response from Google tokeninfo endpoint");

        if !status.is_success() {
            warn!(http_status = %status, "Google tokeninfo rejected the token");
            return Err(GoogleError::InvalidToken(format!(
                "tokeninfo returned HTTP {}",
                status
            )));
        }

        let body = response.json::<serde_json::Value>().await.map_err(|e| {
            error!(error = %e, "Failed to parse Google tokeninfo JSON response");
            GoogleError::SerializationError(e.to_string())
        })?;

        // tokeninfo stringifies numbers and booleans, so read both forms
        if let Some(exp) = json_i64(body.get("exp")) {
            if exp < Utc::now().timestamp() {
                warn!(token_exp = exp, "Google ID token has expired");
                return Err(GoogleError::InvalidToken("token has expired".to_string()));
            }
        }

        match body.get("aud").and_then(|v| v.as_str()) {
            Some(aud) if aud == client_id => {
                debug!("Google ID token audience validation successful");
            }
            Some(aud) => {
                warn!(token_audience = %aud, "Google ID token audience mismatch - rejecting");
                return Err(GoogleError::InvalidToken(
                    "token audience mismatch".to_string(),
                ));
            }
            None => {
                warn!("Google ID token missing audience field - rejecting");
                return Err(GoogleError::InvalidToken(
                    "token missing audience".to_string(),
                ));
            }
        }

        let subject = body
            .get("sub")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| GoogleError::InvalidToken("token missing subject".to_string()))?;

        Ok(GoogleIdentity {
            subject,
            email: body
                .get("email")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            email_verified: json_bool(body.get("email_verified")),
            name: body
                .get("name")
                .and_then(|v| v.as_str())
                .map(str::to_string),
        })
    }
}

fn json_i64(value: Option<&serde_json::Value>) -> Option<i64> {
    let value = value?;
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

fn json_bool(value: Option<&serde_json::Value>) -> bool {
    match value {
        Some(serde_json::Value::Bool(b)) => *b,
        Some(serde_json::Value::String(s)) => s == "true",
        _ => false,
    }
}
