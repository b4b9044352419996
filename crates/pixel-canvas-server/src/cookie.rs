//! Minimal opaque session cookie handling
//!
//! The core crate and the rest of the teacher's stack have no cookie
//! dependency, so this stays a pair of small string helpers rather than
//! pulling in a new crate for two operations: build one `Set-Cookie` value,
//! parse one cookie out of a `Cookie` request header.

use axum::http::HeaderMap;

use crate::state::{SESSION_COOKIE_MAX_AGE_SECS, SESSION_COOKIE_NAME};

/// Build the `Set-Cookie` header value for a newly created user.
#[must_use]
pub fn build_session_cookie(user_id: &str) -> String {
    format!(
        "{SESSION_COOKIE_NAME}={user_id}; HttpOnly; Path=/; Max-Age={SESSION_COOKIE_MAX_AGE_SECS}; SameSite=Lax"
    )
}

/// Extract the session cookie's value (the `userId`) from request headers,
/// if present.
#[must_use]
pub fn read_session_cookie(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(axum::http::header::COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let pair = pair.trim();
        let (name, value) = pair.split_once('=')?;
        (name == SESSION_COOKIE_NAME).then(|| value.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_build_session_cookie_shape() {
        let cookie = build_session_cookie("u1");
        assert!(cookie.starts_with("pixel_session=u1;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=2592000"));
    }

    #[test]
    fn test_read_session_cookie_finds_value_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("foo=bar; pixel_session=u42; baz=qux"),
        );
        assert_eq!(read_session_cookie(&headers), Some("u42".to_string()));
    }

    #[test]
    fn test_read_session_cookie_absent() {
        let headers = HeaderMap::new();
        assert_eq!(read_session_cookie(&headers), None);
    }
}
