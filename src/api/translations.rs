//! Admin translation-management endpoints.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

use super::{error, success, ApiResult};
use crate::errors::AppError;
use crate::translations::{RunReport, RunRequest};
use crate::AppState;

/// GET /admin/translations - Locales and their namespace files.
pub async fn list_translations(
    State(state): State<AppState>,
) -> ApiResult<BTreeMap<String, Vec<String>>> {
    match state.translations.files().inventory().await {
        Ok(inventory) => success(inventory),
        Err(e) => error(e, &state),
    }
}

/// GET /admin/translations/:locale/:namespace - Raw contents of one file.
pub async fn get_translation_file(
    State(state): State<AppState>,
    Path((locale, namespace)): Path<(String, String)>,
) -> ApiResult<Value> {
    match state.translations.files().read(&locale, &namespace).await {
        Ok(Some(messages)) => success(Value::Object(messages)),
        Ok(None) => error(
            AppError::NotFound(format!("{}/{} not found", locale, namespace)),
            &state,
        ),
        Err(e) => error(e, &state),
    }
}

/// PUT /admin/translations/:locale/:namespace - Replace one file.
pub async fn put_translation_file(
    State(state): State<AppState>,
    Path((locale, namespace)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> ApiResult<Value> {
    let Value::Object(messages) = body else {
        return error(
            AppError::Validation("Translation file must be a JSON object".to_string()),
            &state,
        );
    };
    match state
        .translations
        .files()
        .write(&locale, &namespace, &messages)
        .await
    {
        Ok(_) => {
            tracing::info!("Admin updated translations {}/{}", locale, namespace);
            success(Value::Object(messages))
        }
        Err(e) => error(e, &state),
    }
}

/// POST /admin/translations/run - Run push, pull or package.
pub async fn run_translation_operation(
    State(state): State<AppState>,
    Json(request): Json<RunRequest>,
) -> ApiResult<RunReport> {
    match state.translation_sync.run(&request).await {
        Ok(report) => success(report),
        Err(e) => error(e, &state),
    }
}

/// GET /admin/translations/download - Zip of all locale files.
pub async fn download_translations(State(state): State<AppState>) -> Response {
    let archive = match state.translation_sync.package().await {
        Ok(archive) => archive,
        Err(e) => return state.api_error(e).into_response(),
    };

    let filename = format!(
        "attachment; filename=\"locales-{}.zip\"",
        chrono::Utc::now().format("%Y%m%d-%H%M%S")
    );
    let mut response = (StatusCode::OK, archive).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/zip"),
    );
    if let Ok(value) = HeaderValue::from_str(&filename) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    response
}
