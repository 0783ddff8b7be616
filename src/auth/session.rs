//! Session cookie plumbing and token extraction
//!
//! The same JWT travels in the response body and in an HttpOnly cookie;
//! browser clients lean on the cookie, API clients on the bearer header.

use axum::http::{
    header::{AUTHORIZATION, COOKIE},
    HeaderMap, HeaderValue,
};

pub const SESSION_COOKIE_NAME: &str = "token";

/// Build the `Set-Cookie` value carrying a freshly issued session token.
/// Max-Age matches the JWT exp claim so both deliveries lapse together.
pub fn session_cookie(
    token: &str,
    ttl_seconds: i64,
    secure: bool,
) -> Result<HeaderValue, axum::http::header::InvalidHeaderValue> {
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Build the `Set-Cookie` value that drops the session cookie.
pub fn clear_session_cookie(
    secure: bool,
) -> Result<HeaderValue, axum::http::header::InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Pull the session token out of a request: Authorization bearer first,
/// session cookie as the fallback.
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let (Some(key), Some(val)) = (parts.next(), parts.next()) else {
            continue;
        };
        if key.trim() == SESSION_COOKIE_NAME {
            return Some(val.trim().to_string());
        }
    }
    None
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("abc123", 604800, false).unwrap();
        let value = cookie.to_str().unwrap();

        assert!(value.starts_with("token=abc123"));
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("SameSite=Lax"));
        assert!(value.contains("Max-Age=604800"));
        assert!(value.contains("Path=/"));
        assert!(!value.contains("Secure"));

        let secure_cookie = session_cookie("abc123", 604800, true).unwrap();
        assert!(secure_cookie.to_str().unwrap().ends_with("; Secure"));
    }

    #[test]
    fn test_clear_cookie_zeroes_max_age() {
        let cookie = clear_session_cookie(false).unwrap();
        let value = cookie.to_str().unwrap();
        assert!(value.starts_with("token=;"));
        assert!(value.contains("Max-Age=0"));
    }

    #[test]
    fn test_bearer_takes_precedence_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        headers.insert(COOKIE, HeaderValue::from_static("token=from-cookie"));

        assert_eq!(
            extract_session_token(&headers),
            Some("from-header".to_string())
        );
    }

    #[test]
    fn test_cookie_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("other=x; token=from-cookie; theme=dark"),
        );

        assert_eq!(
            extract_session_token(&headers),
            Some("from-cookie".to_string())
        );
    }

    #[test]
    fn test_missing_token_everywhere() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("other=x; malformed"));
        assert_eq!(extract_session_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(extract_session_token(&headers), None);
    }
}
