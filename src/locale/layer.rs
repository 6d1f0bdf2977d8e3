//! Request-boundary locale middleware.

use std::sync::Arc;

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};

use super::{LocaleConfig, LOCALE_COOKIE, LOCALE_COOKIE_MAX_AGE, LOCALE_HEADER};
use crate::cookies::{read_cookie, SetCookie};

/// Resolve the request locale and persist it.
///
/// The resolved locale is visible to handlers as a `ResolvedLocale` extension
/// and as the `x-locale` request header. The response carries the same header
/// and refreshes the `NEXT_LOCALE` cookie.
pub async fn locale_layer(config: Arc<LocaleConfig>, mut request: Request, next: Next) -> Response {
    let cookie = read_cookie(request.headers(), LOCALE_COOKIE);
    let accept_language = request
        .headers()
        .get(axum::http::header::ACCEPT_LANGUAGE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let resolved = config.resolve(
        request.uri().path(),
        cookie.as_deref(),
        accept_language.as_deref(),
    );
    tracing::debug!(
        locale = %resolved.locale,
        source = ?resolved.source,
        page = %config.strip_locale_prefix(request.uri().path()),
        "Resolved request locale"
    );

    let header_name = HeaderName::from_static(LOCALE_HEADER);
    let header_value = HeaderValue::from_str(&resolved.locale).ok();

    if let Some(value) = header_value.clone() {
        request.headers_mut().insert(header_name.clone(), value);
    }
    let locale = resolved.locale.clone();
    request.extensions_mut().insert(resolved);

    let mut response = next.run(request).await;

    if let Some(value) = header_value {
        response.headers_mut().insert(header_name, value);
    }
    SetCookie::new(LOCALE_COOKIE, locale)
        .max_age(LOCALE_COOKIE_MAX_AGE)
        .same_site_lax()
        .append_to(response.headers_mut());

    response
}
