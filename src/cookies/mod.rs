//! Cookie helpers.
//!
//! Reads single values out of the `Cookie` request header and renders
//! `Set-Cookie` header values with the attributes the site uses.

use axum::http::{header, HeaderMap, HeaderValue};

/// A `Set-Cookie` value under construction.
#[derive(Debug, Clone)]
pub struct SetCookie {
    name: String,
    value: String,
    max_age: i64,
    path: &'static str,
    http_only: bool,
    secure: bool,
    same_site_lax: bool,
}

impl SetCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            max_age: 0,
            path: "/",
            http_only: false,
            secure: false,
            same_site_lax: false,
        }
    }

    /// A cookie that tells the browser to drop `name` immediately.
    pub fn expired(name: impl Into<String>) -> Self {
        Self::new(name, "").max_age(0)
    }

    pub fn max_age(mut self, seconds: i64) -> Self {
        self.max_age = seconds;
        self
    }

    pub fn http_only(mut self, enabled: bool) -> Self {
        self.http_only = enabled;
        self
    }

    pub fn secure(mut self, enabled: bool) -> Self {
        self.secure = enabled;
        self
    }

    pub fn same_site_lax(mut self) -> Self {
        self.same_site_lax = true;
        self
    }

    pub fn render(&self) -> String {
        let mut out = format!(
            "{}={}; Path={}; Max-Age={}",
            self.name, self.value, self.path, self.max_age
        );
        if self.http_only {
            out.push_str("; HttpOnly");
        }
        if self.secure {
            out.push_str("; Secure");
        }
        if self.same_site_lax {
            out.push_str("; SameSite=Lax");
        }
        out
    }

    /// Append this cookie to a header map.
    ///
    /// Values that cannot be represented as a header are skipped with a warning.
    pub fn append_to(&self, headers: &mut HeaderMap) {
        match HeaderValue::from_str(&self.render()) {
            Ok(value) => {
                headers.append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::warn!("Dropping unrepresentable cookie {}: {}", self.name, e),
        }
    }
}

/// Find the value of cookie `name` in the request's `Cookie` headers.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}
