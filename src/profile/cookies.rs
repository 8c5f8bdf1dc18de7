//! Minimal cookie tracking.
//!
//! Only the first `Set-Cookie:` header of a response is looked at, and names
//! are never deduplicated: a server that sets the same cookie twice gets both
//! copies sent back. Expiry, path and domain are ignored.

use std::collections::VecDeque;

const SET_COOKIE: &str = "Set-Cookie: ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

/// Cookies in most-recent-first order.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    cookies: VecDeque<Cookie>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the first cookie set by `response`, if any.
    pub fn capture(&mut self, response: &str) -> Option<&Cookie> {
        let cookie = parse_set_cookie(response)?;
        self.cookies.push_front(cookie);
        self.cookies.front()
    }

    /// The `Cookie:` header line for the next request.
    pub fn header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let pairs: Vec<String> = self
            .cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect();
        Some(format!("Cookie: {}", pairs.join(";")))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cookie> {
        self.cookies.iter()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

/// Parse the first `Set-Cookie:` header in a raw response.
///
/// The name runs up to the first `=`; the value runs up to the first `;` or
/// the end of the header line.
pub fn parse_set_cookie(response: &str) -> Option<Cookie> {
    let start = response.find(SET_COOKIE)? + SET_COOKIE.len();
    let rest = &response[start..];
    let line = &rest[..rest.find(['\r', '\n']).unwrap_or(rest.len())];

    let (name, value) = line.split_once('=')?;
    let value = value.split(';').next().unwrap_or_default();

    Some(Cookie {
        name: name.to_string(),
        value: value.to_string(),
    })
}
