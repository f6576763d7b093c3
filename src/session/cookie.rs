//! `session` cookie helpers.

use axum::http::{
    HeaderMap, HeaderValue,
    header::{COOKIE, InvalidHeaderValue},
};
use std::time::Duration;

pub const SESSION_COOKIE_NAME: &str = "session";

/// `session=<credential>; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=<ttl>`.
///
/// # Errors
/// Returns an error if the credential is not a valid header value.
pub fn session_cookie(credential: &str, ttl: Duration) -> Result<HeaderValue, InvalidHeaderValue> {
    let max_age = ttl.as_secs();
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE_NAME}={credential}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={max_age}"
    ))
}

#[must_use]
pub fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static("session=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0")
}

/// Pull the credential out of the request `Cookie` headers. Empty values count as absent.
#[must_use]
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|value| cookie_value(value, SESSION_COOKIE_NAME))
}

/// Value of the `session` cookie in a `Set-Cookie` header, `None` when it is
/// absent or being cleared.
#[must_use]
pub fn credential_from_set_cookie(header: &str) -> Option<String> {
    let first = header.split(';').next()?;
    let (key, value) = first.split_once('=')?;
    let value = value.trim();
    if key.trim() == SESSION_COOKIE_NAME && !value.is_empty() {
        Some(value.to_string())
    } else {
        None
    }
}

fn cookie_value(header: &str, name: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        let value = value.trim();
        (key.trim() == name && !value.is_empty()).then(|| value.to_string())
    })
}
