//! Admin database endpoints.

use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{error, success, ApiResult};
use crate::db::{
    ExportFormat, GrowthReport, HealthReport, PageRequest, QueryKind, QueryOutcome, RowPage,
    TableSchema, TableSummary,
};
use crate::errors::AppError;
use crate::AppState;

/// GET /admin/db/health - Database round-trip check.
pub async fn db_health(State(state): State<AppState>) -> ApiResult<HealthReport> {
    match state.inspector.health().await {
        Ok(report) => success(report),
        Err(e) => error(e, &state),
    }
}

/// GET /admin/db/tables - List tables with row counts.
pub async fn list_tables(State(state): State<AppState>) -> ApiResult<Vec<TableSummary>> {
    match state.inspector.list_tables().await {
        Ok(tables) => success(tables),
        Err(e) => error(e, &state),
    }
}

/// GET /admin/db/tables/:table - Column layout of a table.
pub async fn describe_table(
    State(state): State<AppState>,
    Path(table): Path<String>,
) -> ApiResult<TableSchema> {
    match state.inspector.table_schema(&table).await {
        Ok(schema) => success(schema),
        Err(e) => error(e, &state),
    }
}

/// GET /admin/db/tables/:table/rows - Paginated, sortable rows.
pub async fn list_rows(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Query(params): Query<PageRequest>,
) -> ApiResult<RowPage> {
    match state.inspector.list_rows(&table, &params).await {
        Ok(page) => success(page),
        Err(e) => error(e, &state),
    }
}

fn object_body(body: Value) -> Result<Map<String, Value>, AppError> {
    match body {
        Value::Object(map) => Ok(map),
        _ => Err(AppError::Validation(
            "Row body must be a JSON object".to_string(),
        )),
    }
}

/// POST /admin/db/tables/:table/rows - Insert a row.
pub async fn create_row(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<Value> {
    let values = match object_body(body) {
        Ok(values) => values,
        Err(e) => return error(e, &state),
    };
    match state.inspector.create_row(&table, values).await {
        Ok(row) => success(row),
        Err(e) => error(e, &state),
    }
}

/// PUT /admin/db/tables/:table/rows/:id - Update a row by primary key.
pub async fn update_row(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> ApiResult<Value> {
    let values = match object_body(body) {
        Ok(values) => values,
        Err(e) => return error(e, &state),
    };
    match state.inspector.update_row(&table, &id, values).await {
        Ok(row) => success(row),
        Err(e) => error(e, &state),
    }
}

/// DELETE /admin/db/tables/:table/rows/:id - Delete a row by primary key.
pub async fn delete_row(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, String)>,
) -> ApiResult<()> {
    match state.inspector.delete_row(&table, &id).await {
        Ok(()) => success(()),
        Err(e) => error(e, &state),
    }
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub format: Option<ExportFormat>,
}

/// GET /admin/db/tables/:table/export - Download a table as CSV (default) or JSON.
pub async fn export_table(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Query(params): Query<ExportQuery>,
) -> Response {
    let format = params.format.unwrap_or(ExportFormat::Csv);
    let file = match state.inspector.export_table(&table, format).await {
        Ok(file) => file,
        Err(e) => return state.api_error(e).into_response(),
    };

    let disposition = format!("attachment; filename=\"{}\"", file.filename);
    let mut response = (StatusCode::OK, file.body).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(file.content_type),
    );
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    response
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub sql: String,
    pub kind: QueryKind,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// POST /admin/db/query - Run an ad hoc statement with a time limit.
pub async fn run_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> ApiResult<QueryOutcome> {
    let timeout = request.timeout_ms.map(Duration::from_millis);
    match state
        .inspector
        .run_query(&request.sql, request.kind, timeout)
        .await
    {
        Ok(outcome) => success(outcome),
        Err(e) => error(e, &state),
    }
}

#[derive(Debug, Deserialize)]
pub struct GrowthQuery {
    pub table: String,
    pub column: String,
    #[serde(default)]
    pub days: Option<u32>,
}

/// GET /admin/db/analytics - Daily growth of a table.
pub async fn growth_analytics(
    State(state): State<AppState>,
    Query(params): Query<GrowthQuery>,
) -> ApiResult<GrowthReport> {
    match state
        .inspector
        .growth(&params.table, &params.column, params.days)
        .await
    {
        Ok(report) => success(report),
        Err(e) => error(e, &state),
    }
}
