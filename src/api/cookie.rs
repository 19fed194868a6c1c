//! Session cookie handling
//!
//! Parsing of the `Cookie` request header and construction of the
//! `Set-Cookie` values issued at login and logout.

use axum::http::{header, HeaderMap};
use chrono::{DateTime, Utc};

use crate::models::Session;

/// Name of the cookie carrying the session token
pub const SESSION_COOKIE: &str = "session_token";

/// `Set-Cookie` value that removes the session cookie
pub const CLEAR_SESSION_COOKIE: &str =
    "session_token=; Path=/; HttpOnly; Secure; SameSite=Lax; Expires=Thu, 01 Jan 1970 00:00:00 GMT";

/// Split a `Cookie` header into `(name, value)` pairs.
///
/// Segments are separated by `;` and split on the first `=`. Names and
/// values are trimmed; a segment without `=` yields an empty value and
/// segments with an empty name are skipped.
pub fn parse_cookies(header: &str) -> Vec<(&str, &str)> {
    header
        .split(';')
        .filter_map(|segment| {
            let (name, value) = segment.split_once('=').unwrap_or((segment, ""));
            let name = name.trim();
            (!name.is_empty()).then(|| (name, value.trim()))
        })
        .collect()
}

/// Value of the first cookie called `name` across all `Cookie` headers
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(parse_cookies)
        .find(|(cookie, _)| *cookie == name)
        .map(|(_, value)| value)
}

/// `Set-Cookie` value for a freshly issued session
pub fn session_cookie(session: &Session) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; Secure; SameSite=Lax; Expires={}",
        SESSION_COOKIE,
        session.token,
        http_date(session.expires_at)
    )
}

/// RFC 1123 date as used by the `Expires` attribute
fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
