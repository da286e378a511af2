//! The `jwt` session cookie: how a token travels between client and server.

use axum::http::{
    HeaderMap, HeaderValue,
    header::{COOKIE, InvalidHeaderValue},
};

pub const SESSION_COOKIE_NAME: &str = "jwt";

/// Build the cookie carrying a freshly issued token.
pub fn session_cookie(token: &str, ttl_seconds: i64) -> Result<HeaderValue, InvalidHeaderValue> {
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; Secure; SameSite=Strict; Max-Age={ttl_seconds}"
    ))
}

/// Overwrite the cookie with an empty, already expired value.
pub fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static(
        "jwt=; Path=/; HttpOnly; Secure; SameSite=Strict; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT",
    )
}

/// Token from the `jwt` cookie, if present and non-empty.
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (key, val) = pair.trim().split_once('=')?;
            (key.trim() == SESSION_COOKIE_NAME).then(|| val.trim().to_string())
        })
        .filter(|token| !token.is_empty())
}
