//! Admin database inspection.
//!
//! Every table and column name that reaches SQL text is first checked against
//! `sqlite_master` / `pragma_table_info`, then quoted.

use std::time::{Duration, Instant};

use chrono::Utc;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::sqlite::SqliteConnection;
use sqlx::{Column, Row, SqlitePool};

use super::values::{bind_json, quote_ident, row_to_json, rows_to_csv};
use crate::errors::AppError;

/// Default rows per page.
pub const DEFAULT_PAGE_SIZE: u32 = 50;
/// Largest page a caller may request.
pub const MAX_PAGE_SIZE: u32 = 500;
/// Default and maximum growth window in days.
pub const DEFAULT_GROWTH_DAYS: u32 = 30;
pub const MAX_GROWTH_DAYS: u32 = 365;

/// VM steps between deadline checks of an ad hoc statement.
const PROGRESS_CHECK_OPS: i32 = 1_000;
/// Time allowed for SQLite to notice the deadline before the caller gives up.
const INTERRUPT_GRACE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSummary {
    pub name: String,
    pub row_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    pub primary_key: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

impl TableSchema {
    fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    fn primary_keys(&self) -> Vec<&ColumnInfo> {
        self.columns.iter().filter(|c| c.primary_key).collect()
    }

    /// Column used to address single rows. Tables without a declared key use `rowid`.
    fn row_key(&self) -> Result<String, AppError> {
        match self.primary_keys().as_slice() {
            [] => Ok("rowid".to_string()),
            [single] => Ok(single.name.clone()),
            _ => Err(AppError::BadRequest(format!(
                "Table {} has a composite primary key; row addressing is not supported",
                self.name
            ))),
        }
    }

    fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Paging and sorting for row listings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub page_size: Option<u32>,
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub order: Option<SortOrder>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowPage {
    pub rows: Vec<Value>,
    pub page: u32,
    pub page_size: u32,
    pub total: i64,
    pub total_pages: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
}

/// A rendered export ready to be sent as an attachment.
#[derive(Debug, Clone)]
pub struct ExportFile {
    pub filename: String,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

/// How an ad hoc statement is run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    /// Returns rows, capped at the configured maximum
    Select,
    /// Returns the number of affected rows
    Execute,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum QueryOutcome {
    #[serde(rename_all = "camelCase")]
    Rows {
        columns: Vec<String>,
        rows: Vec<Value>,
        row_count: usize,
        truncated: bool,
        elapsed_ms: u64,
    },
    #[serde(rename_all = "camelCase")]
    Affected { rows_affected: u64, elapsed_ms: u64 },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub latency_ms: u64,
    pub checked_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyCount {
    pub day: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrowthReport {
    pub table: String,
    pub column: String,
    pub days: u32,
    pub series: Vec<DailyCount>,
    pub period_total: i64,
    pub total_rows: i64,
}

/// Admin database tools over the site's SQLite pool.
#[derive(Clone)]
pub struct DatabaseInspector {
    pool: SqlitePool,
    query_timeout: Duration,
    query_max_rows: usize,
}

impl DatabaseInspector {
    pub fn new(pool: SqlitePool, query_timeout: Duration, query_max_rows: usize) -> Self {
        Self {
            pool,
            query_timeout,
            query_max_rows,
        }
    }

    /// Round-trip a trivial statement and report latency.
    pub async fn health(&self) -> Result<HealthReport, AppError> {
        let started = Instant::now();
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(HealthReport {
            status: "ok",
            latency_ms: started.elapsed().as_millis() as u64,
            checked_at: Utc::now().to_rfc3339(),
        })
    }

    async fn table_names(&self) -> Result<Vec<String>, AppError> {
        let rows = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(|row| row.get::<String, _>("name")).collect())
    }

    /// List user tables with their row counts.
    pub async fn list_tables(&self) -> Result<Vec<TableSummary>, AppError> {
        let mut tables = Vec::new();
        for name in self.table_names().await? {
            let row_count = self.count_rows(&name).await?;
            tables.push(TableSummary { name, row_count });
        }
        Ok(tables)
    }

    async fn count_rows(&self, table: &str) -> Result<i64, AppError> {
        let sql = format!("SELECT COUNT(*) AS total FROM {}", quote_ident(table));
        let row = sqlx::query(&sql).fetch_one(&self.pool).await?;
        Ok(row.get::<i64, _>("total"))
    }

    /// Describe the columns of `table`.
    pub async fn table_schema(&self, table: &str) -> Result<TableSchema, AppError> {
        if !self.table_names().await?.iter().any(|t| t == table) {
            return Err(AppError::NotFound(format!("Table {} not found", table)));
        }

        let rows = sqlx::query(
            r#"SELECT name, type AS data_type, "notnull" AS not_null, dflt_value AS default_value, pk
               FROM pragma_table_info(?) ORDER BY cid"#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        let columns = rows
            .iter()
            .map(|row| {
                let object = row_to_json(row);
                ColumnInfo {
                    name: object
                        .get("name")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    data_type: object
                        .get("data_type")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    nullable: object.get("not_null").and_then(Value::as_i64) != Some(1),
                    default_value: match object.get("default_value") {
                        None | Some(Value::Null) => None,
                        Some(Value::String(s)) => Some(s.clone()),
                        Some(other) => Some(other.to_string()),
                    },
                    primary_key: object.get("pk").and_then(Value::as_i64).unwrap_or(0) > 0,
                }
            })
            .collect();

        Ok(TableSchema {
            name: table.to_string(),
            columns,
        })
    }

    /// One page of rows, optionally sorted by a column.
    pub async fn list_rows(&self, table: &str, request: &PageRequest) -> Result<RowPage, AppError> {
        let schema = self.table_schema(table).await?;

        let page = request.page.unwrap_or(1).max(1);
        let page_size = request
            .page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let order = request.order.unwrap_or_default();

        let sort_column = match request.sort.as_deref().filter(|s| !s.is_empty()) {
            Some(sort) if schema.has_column(sort) => Some(sort.to_string()),
            Some(sort) => {
                return Err(AppError::Validation(format!(
                    "Unknown sort column {} for table {}",
                    sort, table
                )))
            }
            None => schema.primary_keys().first().map(|c| c.name.clone()),
        };

        let total = self.count_rows(table).await?;
        let order_clause = sort_column
            .map(|c| format!(" ORDER BY {} {}", quote_ident(&c), order.as_sql()))
            .unwrap_or_default();
        let sql = format!(
            "SELECT * FROM {}{} LIMIT ? OFFSET ?",
            quote_ident(table),
            order_clause
        );
        let offset = i64::from(page - 1) * i64::from(page_size);

        let rows = sqlx::query(&sql)
            .bind(i64::from(page_size))
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let page_size_i64 = i64::from(page_size);
        Ok(RowPage {
            rows: rows
                .iter()
                .map(|row| Value::Object(row_to_json(row)))
                .collect(),
            page,
            page_size,
            total,
            total_pages: (total + page_size_i64 - 1) / page_size_i64,
        })
    }

    fn check_columns(schema: &TableSchema, values: &Map<String, Value>) -> Result<(), AppError> {
        if values.is_empty() {
            return Err(AppError::Validation("Row body must not be empty".to_string()));
        }
        if let Some(unknown) = values.keys().find(|k| !schema.has_column(k)) {
            return Err(AppError::Validation(format!(
                "Unknown column {} for table {}",
                unknown, schema.name
            )));
        }
        Ok(())
    }

    /// Insert a row and return it as stored.
    pub async fn create_row(
        &self,
        table: &str,
        mut values: Map<String, Value>,
    ) -> Result<Value, AppError> {
        let schema = self.table_schema(table).await?;

        if let [key] = schema.primary_keys().as_slice() {
            let is_text = key.data_type.eq_ignore_ascii_case("TEXT");
            if key.name == "id" && is_text && !values.contains_key("id") {
                values.insert(
                    "id".to_string(),
                    Value::String(uuid::Uuid::new_v4().to_string()),
                );
            }
        }
        Self::check_columns(&schema, &values)?;

        let columns: Vec<String> = values.keys().map(|k| quote_ident(k)).collect();
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
            quote_ident(table),
            columns.join(", "),
            placeholders
        );

        let mut query = sqlx::query(&sql);
        for value in values.values() {
            query = bind_json(query, value);
        }
        let row = query.fetch_one(&self.pool).await.map_err(statement_error)?;

        tracing::info!(table = %table, "Admin inserted row");
        Ok(Value::Object(row_to_json(&row)))
    }

    /// Update the row whose key equals `id`.
    pub async fn update_row(
        &self,
        table: &str,
        id: &str,
        values: Map<String, Value>,
    ) -> Result<Value, AppError> {
        let schema = self.table_schema(table).await?;
        Self::check_columns(&schema, &values)?;
        let key = schema.row_key()?;

        let assignments: Vec<String> = values
            .keys()
            .map(|k| format!("{} = ?", quote_ident(k)))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ? RETURNING *",
            quote_ident(table),
            assignments.join(", "),
            quote_ident(&key)
        );

        let mut query = sqlx::query(&sql);
        for value in values.values() {
            query = bind_json(query, value);
        }
        let row = query
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(statement_error)?
            .ok_or_else(|| AppError::NotFound(format!("Row {} not found in {}", id, table)))?;

        tracing::info!(table = %table, id = %id, "Admin updated row");
        Ok(Value::Object(row_to_json(&row)))
    }

    /// Delete the row whose key equals `id`.
    pub async fn delete_row(&self, table: &str, id: &str) -> Result<(), AppError> {
        let schema = self.table_schema(table).await?;
        let key = schema.row_key()?;
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?",
            quote_ident(table),
            quote_ident(&key)
        );

        let result = sqlx::query(&sql)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(statement_error)?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Row {} not found in {}",
                id, table
            )));
        }

        tracing::info!(table = %table, id = %id, "Admin deleted row");
        Ok(())
    }

    /// Dump a whole table as CSV or JSON.
    pub async fn export_table(
        &self,
        table: &str,
        format: ExportFormat,
    ) -> Result<ExportFile, AppError> {
        let schema = self.table_schema(table).await?;
        let order_clause = schema
            .primary_keys()
            .first()
            .map(|c| format!(" ORDER BY {}", quote_ident(&c.name)))
            .unwrap_or_default();
        let sql = format!("SELECT * FROM {}{}", quote_ident(table), order_clause);
        let rows: Vec<Map<String, Value>> = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(row_to_json)
            .collect();

        let stamp = Utc::now().format("%Y%m%d-%H%M%S");
        let file = match format {
            ExportFormat::Csv => ExportFile {
                filename: format!("{}-{}.csv", table, stamp),
                content_type: "text/csv; charset=utf-8",
                body: rows_to_csv(&schema.column_names(), &rows).into_bytes(),
            },
            ExportFormat::Json => {
                let rows: Vec<Value> = rows.into_iter().map(Value::Object).collect();
                ExportFile {
                    filename: format!("{}-{}.json", table, stamp),
                    content_type: "application/json",
                    body: serde_json::to_vec_pretty(&rows)?,
                }
            }
        };

        tracing::info!(table = %table, file = %file.filename, "Admin exported table");
        Ok(file)
    }

    /// Run an ad hoc statement under a time bound.
    ///
    /// `timeout` is capped at the configured maximum. Exceeding it yields
    /// `AppError::Timeout`; the statement is interrupted and its connection
    /// is closed instead of being returned to the pool.
    pub async fn run_query(
        &self,
        sql: &str,
        kind: QueryKind,
        timeout: Option<Duration>,
    ) -> Result<QueryOutcome, AppError> {
        let sql = sql.trim();
        if sql.is_empty() {
            return Err(AppError::Validation("SQL must not be empty".to_string()));
        }

        let budget = timeout
            .map(|t| t.min(self.query_timeout))
            .unwrap_or(self.query_timeout);
        let started = Instant::now();
        let deadline = started + budget;

        // SQLite keeps stepping a statement after its future is dropped
        let mut conn = self.pool.acquire().await?;
        conn.lock_handle()
            .await?
            .set_progress_handler(PROGRESS_CHECK_OPS, move || Instant::now() < deadline);

        let work = async {
            match kind {
                QueryKind::Select => select_capped(&mut conn, sql, self.query_max_rows).await,
                QueryKind::Execute => {
                    let result = sqlx::query(sql)
                        .execute(&mut *conn)
                        .await
                        .map_err(statement_error)?;
                    Ok((Vec::new(), Vec::new(), false, result.rows_affected()))
                }
            }
        };

        let result = match tokio::time::timeout(budget + INTERRUPT_GRACE, work).await {
            Ok(Err(_)) | Err(_) if Instant::now() >= deadline => None,
            Ok(result) => Some(result),
            Err(_) => None,
        };

        let Some(result) = result else {
            // The handle may still be busy; never hand it back to the pool.
            conn.close_on_drop();
            tracing::warn!(
                timeout_ms = budget.as_millis() as u64,
                "Ad hoc query timed out"
            );
            return Err(AppError::Timeout(format!(
                "Query exceeded the {} ms time limit",
                budget.as_millis()
            )));
        };

        let discard = match conn.lock_handle().await {
            Ok(mut handle) => {
                handle.remove_progress_handler();
                false
            }
            Err(e) => {
                tracing::warn!("Could not clear progress handler, discarding connection: {}", e);
                true
            }
        };
        if discard {
            conn.close_on_drop();
        }
        let (columns, rows, truncated, rows_affected) = result?;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::info!(kind = ?kind, elapsed_ms, "Ad hoc query finished");

        Ok(match kind {
            QueryKind::Select => QueryOutcome::Rows {
                row_count: rows.len(),
                columns,
                rows,
                truncated,
                elapsed_ms,
            },
            QueryKind::Execute => QueryOutcome::Affected {
                rows_affected,
                elapsed_ms,
            },
        })
    }

    /// Daily row counts over the last `days` days, keyed on a date column.
    pub async fn growth(
        &self,
        table: &str,
        column: &str,
        days: Option<u32>,
    ) -> Result<GrowthReport, AppError> {
        let schema = self.table_schema(table).await?;
        if !schema.has_column(column) {
            return Err(AppError::Validation(format!(
                "Unknown column {} for table {}",
                column, table
            )));
        }
        let days = days.unwrap_or(DEFAULT_GROWTH_DAYS).clamp(1, MAX_GROWTH_DAYS);

        let date_expr = format!("date({})", quote_ident(column));
        let sql = format!(
            "SELECT {expr} AS day, COUNT(*) AS count FROM {table} \
             WHERE {expr} >= date('now', ?) GROUP BY day ORDER BY day",
            expr = date_expr,
            table = quote_ident(table)
        );
        let window = format!("-{} days", days - 1);
        let rows = sqlx::query(&sql)
            .bind(window)
            .fetch_all(&self.pool)
            .await?;

        let series: Vec<DailyCount> = rows
            .iter()
            .map(|row| DailyCount {
                day: row.get::<String, _>("day"),
                count: row.get::<i64, _>("count"),
            })
            .collect();
        let period_total = series.iter().map(|d| d.count).sum();
        let total_rows = self.count_rows(table).await?;

        Ok(GrowthReport {
            table: table.to_string(),
            column: column.to_string(),
            days,
            series,
            period_total,
            total_rows,
        })
    }
}

async fn select_capped(
    conn: &mut SqliteConnection,
    sql: &str,
    max_rows: usize,
) -> Result<(Vec<String>, Vec<Value>, bool, u64), AppError> {
    let mut stream = sqlx::query(sql).fetch(conn);
    let mut columns = Vec::new();
    let mut rows = Vec::new();
    let mut truncated = false;

    while let Some(row) = stream.next().await {
        let row = row.map_err(statement_error)?;
        if columns.is_empty() {
            columns = row
                .columns()
                .iter()
                .map(|c| c.name().to_string())
                .collect();
        }
        if rows.len() >= max_rows {
            truncated = true;
            break;
        }
        rows.push(Value::Object(row_to_json(&row)));
    }

    Ok((columns, rows, truncated, 0))
}

/// Errors raised by caller-supplied SQL or values are the caller's fault.
fn statement_error(err: sqlx::Error) -> AppError {
    match err {
        sqlx::Error::Database(db) => {
            tracing::debug!("Statement rejected: {}", db);
            AppError::BadRequest(db.message().to_string())
        }
        other => AppError::from(other),
    }
}
