use axum::http::{header, HeaderMap, HeaderValue};
use chrono::Duration;

/// HttpOnly cookie carrying the admin session token.
pub const ADMIN_SESSION: &str = "admin_session";

/// Script-readable "is logged in" mirror for the UI. Not a security boundary.
pub const ADMIN_ACCESS: &str = "adminAccess";

/// HttpOnly cookie carrying a general user session token.
pub const USER_TOKEN: &str = "token";

#[derive(Debug, Clone, Copy)]
pub struct CookieOptions {
    pub http_only: bool,
    pub secure: bool,
}

/// Builds a `Set-Cookie` value scoped to the whole site.
pub fn set_cookie(name: &str, value: &str, max_age: Duration, opts: CookieOptions) -> HeaderValue {
    let mut cookie = format!(
        "{}={}; Path=/; Max-Age={}; SameSite=Lax",
        name,
        value,
        max_age.num_seconds().max(0)
    );
    if opts.http_only {
        cookie.push_str("; HttpOnly");
    }
    if opts.secure {
        cookie.push_str("; Secure");
    }
    // token and flag values are base64url / ascii
    HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static(""))
}

/// A `Set-Cookie` value that removes the cookie.
pub fn clear_cookie(name: &str, opts: CookieOptions) -> HeaderValue {
    set_cookie(name, "", Duration::zero(), opts)
}

/// Value of the named cookie from the request's `Cookie` headers.
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_cookie_attributes() {
        let value = set_cookie(
            ADMIN_SESSION,
            "abc",
            Duration::hours(2),
            CookieOptions {
                http_only: true,
                secure: true,
            },
        );
        let value = value.to_str().unwrap();
        assert!(value.starts_with("admin_session=abc;"));
        assert!(value.contains("Max-Age=7200"));
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("Secure"));
    }

    #[test]
    fn test_clear_cookie_expires_immediately() {
        let opts = CookieOptions {
            http_only: false,
            secure: false,
        };
        let value = clear_cookie(ADMIN_ACCESS, opts);
        let value = value.to_str().unwrap();
        assert!(value.contains("Max-Age=0"));
        assert!(!value.contains("HttpOnly"));
    }

    #[test]
    fn test_read_cookie_among_many() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; admin_session=tok.en.x; adminAccess=true"),
        );
        assert_eq!(read_cookie(&headers, ADMIN_SESSION), Some("tok.en.x"));
        assert_eq!(read_cookie(&headers, ADMIN_ACCESS), Some("true"));
        assert_eq!(read_cookie(&headers, USER_TOKEN), None);
    }

    #[test]
    fn test_read_cookie_ignores_empty_value() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("admin_session="));
        assert_eq!(read_cookie(&headers, ADMIN_SESSION), None);
    }
}
