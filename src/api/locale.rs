//! Locale and page-translation endpoints.

use axum::{
    extract::{Query, State},
    Extension,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::{error, success, ApiResult};
use crate::locale::{parse_namespace_list, Direction, LocaleSource, ResolvedLocale};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocaleInfo {
    pub locale: String,
    pub direction: Direction,
    pub source: LocaleSource,
    pub default_locale: String,
    pub supported_locales: Vec<String>,
}

/// GET /api/locale - The locale resolved for this request.
pub async fn get_locale(
    State(state): State<AppState>,
    Extension(resolved): Extension<ResolvedLocale>,
) -> ApiResult<LocaleInfo> {
    let locales = state.translations.locales();
    success(LocaleInfo {
        direction: resolved.direction(),
        locale: resolved.locale,
        source: resolved.source,
        default_locale: locales.default_locale().to_string(),
        supported_locales: locales.supported().to_vec(),
    })
}

#[derive(Debug, Deserialize)]
pub struct TranslationsQuery {
    /// Comma separated namespaces (default: `common`).
    #[serde(default)]
    pub ns: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageTranslations {
    pub locale: String,
    pub direction: Direction,
    pub namespaces: BTreeMap<String, Value>,
}

/// GET /api/i18n - Translations a server-rendered page needs.
pub async fn get_page_translations(
    State(state): State<AppState>,
    Extension(resolved): Extension<ResolvedLocale>,
    Query(params): Query<TranslationsQuery>,
) -> ApiResult<PageTranslations> {
    let mut namespaces = parse_namespace_list(params.ns.as_deref().unwrap_or_default());
    if namespaces.is_empty() {
        namespaces.push("common".to_string());
    }

    match state
        .translations
        .load_namespaces(&resolved.locale, &namespaces)
        .await
    {
        Ok(loaded) => success(PageTranslations {
            direction: resolved.direction(),
            locale: resolved.locale,
            namespaces: loaded,
        }),
        Err(e) => error(e, &state),
    }
}
