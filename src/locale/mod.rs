//! Locale resolution.
//!
//! A request's locale comes from, in order: a leading path segment, the
//! `NEXT_LOCALE` cookie, the primary subtag of the first `Accept-Language`
//! entry, and finally the configured default. Resolution never fails.

mod layer;
mod store;

pub use layer::*;
pub use store::*;

use serde::Serialize;

/// Cookie that remembers the resolved locale between requests.
pub const LOCALE_COOKIE: &str = "NEXT_LOCALE";
/// Request and response header carrying the resolved locale.
pub const LOCALE_HEADER: &str = "x-locale";
/// One year.
pub const LOCALE_COOKIE_MAX_AGE: i64 = 31_536_000;

const RTL_LANGUAGES: [&str; 4] = ["ar", "he", "fa", "ur"];

/// Text direction of a locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ltr,
    Rtl,
}

impl Direction {
    pub fn of(locale: &str) -> Self {
        let language = primary_subtag(locale).unwrap_or(locale);
        if RTL_LANGUAGES
            .iter()
            .any(|rtl| rtl.eq_ignore_ascii_case(language))
        {
            Direction::Rtl
        } else {
            Direction::Ltr
        }
    }
}

/// Which signal decided the locale. Useful in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LocaleSource {
    Path,
    Cookie,
    Header,
    Default,
}

/// Supported locales and the fallback.
#[derive(Debug, Clone)]
pub struct LocaleConfig {
    supported: Vec<String>,
    default: String,
}

impl LocaleConfig {
    /// Build a config; an unsupported default is added to the supported set.
    pub fn new(supported: Vec<String>, default: impl Into<String>) -> Self {
        let default = default.into();
        let mut supported = supported;
        if !supported.iter().any(|l| l.eq_ignore_ascii_case(&default)) {
            supported.push(default.clone());
        }
        Self { supported, default }
    }

    pub fn supported(&self) -> &[String] {
        &self.supported
    }

    pub fn default_locale(&self) -> &str {
        &self.default
    }

    /// Canonical spelling of `candidate` if it is supported.
    pub fn find(&self, candidate: &str) -> Option<&str> {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            return None;
        }
        self.supported
            .iter()
            .find(|l| l.eq_ignore_ascii_case(candidate))
            .map(String::as_str)
    }

    /// Resolve a locale from the request signals.
    pub fn resolve(
        &self,
        path: &str,
        cookie: Option<&str>,
        accept_language: Option<&str>,
    ) -> ResolvedLocale {
        if let Some(locale) = first_path_segment(path).and_then(|s| self.find(s)) {
            return ResolvedLocale::new(locale, LocaleSource::Path);
        }
        if let Some(locale) = cookie.and_then(|c| self.find(c)) {
            return ResolvedLocale::new(locale, LocaleSource::Cookie);
        }
        if let Some(locale) = accept_language
            .and_then(preferred_language)
            .and_then(|l| self.find(l))
        {
            return ResolvedLocale::new(locale, LocaleSource::Header);
        }
        ResolvedLocale::new(&self.default, LocaleSource::Default)
    }

    /// Remove a leading supported-locale segment from `path`.
    ///
    /// `/ar/docs` becomes `/docs`, `/ar` becomes `/`, other paths are returned as is.
    pub fn strip_locale_prefix<'a>(&self, path: &'a str) -> &'a str {
        let Some(segment) = first_path_segment(path) else {
            return path;
        };
        if self.find(segment).is_none() {
            return path;
        }
        let rest = &path.trim_start_matches('/')[segment.len()..];
        if rest.is_empty() {
            "/"
        } else {
            rest
        }
    }
}

/// Outcome of locale resolution, stored in request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLocale {
    pub locale: String,
    pub source: LocaleSource,
}

impl ResolvedLocale {
    fn new(locale: &str, source: LocaleSource) -> Self {
        Self {
            locale: locale.to_string(),
            source,
        }
    }

    pub fn direction(&self) -> Direction {
        Direction::of(&self.locale)
    }
}

fn first_path_segment(path: &str) -> Option<&str> {
    let path = path.split(['?', '#']).next().unwrap_or("");
    path.trim_start_matches('/')
        .split('/')
        .next()
        .filter(|s| !s.is_empty())
}

/// Primary subtag of the first `Accept-Language` entry.
///
/// Only the first entry is considered; quality values are not used to reorder.
/// Returns `None` for empty or malformed headers.
pub fn preferred_language(header: &str) -> Option<&str> {
    let first = header.split(',').next()?;
    let tag = first.split(';').next()?.trim();
    primary_subtag(tag)
}

fn primary_subtag(tag: &str) -> Option<&str> {
    let subtag = tag.split(['-', '_']).next()?.trim();
    let valid = !subtag.is_empty()
        && subtag.len() <= 8
        && subtag.chars().all(|c| c.is_ascii_alphabetic());
    valid.then_some(subtag)
}
