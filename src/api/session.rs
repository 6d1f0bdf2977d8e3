//! Session endpoints.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

use super::{error, success, ApiResponse, ApiResult};
use crate::cookies::read_cookie;
use crate::errors::AppError;
use crate::session::{extract_id_token, SESSION_COOKIE};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SessionStatus {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct SessionSubject {
    pub uid: String,
}

/// POST /api/auth/session - Exchange an identity token for a session cookie.
pub async fn create_session(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => {
            let err = AppError::Validation(format!("Invalid request body: {}", rejection));
            return state.api_error(err).into_response();
        }
    };

    let id_token = match extract_id_token(&body) {
        Ok(token) => token,
        Err(e) => return state.api_error(e).into_response(),
    };

    match state.sessions.create(id_token).await {
        Ok(cookie) => {
            let mut headers = HeaderMap::new();
            cookie.append_to(&mut headers);
            (
                StatusCode::OK,
                headers,
                ApiResponse::new(SessionStatus { status: "success" }),
            )
                .into_response()
        }
        Err(e) => state.api_error(e).into_response(),
    }
}

/// GET /api/auth/session - Subject of the current session.
pub async fn get_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<SessionSubject> {
    let cookie = read_cookie(&headers, SESSION_COOKIE);
    match state.sessions.inspect(cookie.as_deref()).await {
        Ok(claims) => success(SessionSubject { uid: claims.uid }),
        Err(e) => error(e, &state),
    }
}

/// POST /api/auth/logout - End the session. Always succeeds and clears the cookie.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let cookie = read_cookie(&headers, SESSION_COOKIE);
    let cleared = state.sessions.destroy(cookie.as_deref()).await;

    let mut response_headers = HeaderMap::new();
    cleared.append_to(&mut response_headers);
    (
        StatusCode::OK,
        response_headers,
        ApiResponse::new(SessionStatus { status: "success" }),
    )
        .into_response()
}
