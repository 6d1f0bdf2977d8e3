//! Conversions between dynamically typed SQLite values and JSON.

use serde_json::{Map, Value};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Column, Row, Sqlite, TypeInfo, ValueRef};

/// Quote an identifier for interpolation into SQL.
///
/// Callers still validate names against introspection first.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Convert a row into a JSON object keyed by column name.
pub fn row_to_json(row: &SqliteRow) -> Map<String, Value> {
    let mut object = Map::new();
    for (index, column) in row.columns().iter().enumerate() {
        object.insert(column.name().to_string(), cell_to_json(row, index));
    }
    object
}

fn cell_to_json(row: &SqliteRow, index: usize) -> Value {
    let storage = match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => raw.type_info().name().to_string(),
        Err(_) => return Value::Null,
    };

    let value = match storage.as_str() {
        "INTEGER" => row.try_get::<i64, _>(index).map(Value::from),
        "REAL" => row.try_get::<f64, _>(index).map(Value::from),
        "BLOB" => row
            .try_get::<Vec<u8>, _>(index)
            .map(|bytes| Value::String(to_hex(&bytes))),
        _ => row.try_get::<String, _>(index).map(Value::String),
    };

    value.unwrap_or_else(|e| {
        tracing::debug!("Undecodable cell at column {}: {}", index, e);
        Value::Null
    })
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Bind a JSON value as the closest SQLite type. Arrays and objects are stored as JSON text.
pub fn bind_json<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &Value,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64()),
        },
        Value::String(s) => query.bind(s.clone()),
        other => query.bind(other.to_string()),
    }
}

/// Render rows as RFC 4180 CSV with a header line.
pub fn rows_to_csv(columns: &[String], rows: &[Map<String, Value>]) -> String {
    let mut out = String::new();
    push_csv_line(&mut out, columns.iter().map(|c| csv_field(c)));
    for row in rows {
        push_csv_line(
            &mut out,
            columns.iter().map(|c| match row.get(c) {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(s)) => csv_field(s),
                Some(other) => csv_field(&other.to_string()),
            }),
        );
    }
    out
}

fn push_csv_line(out: &mut String, fields: impl Iterator<Item = String>) {
    let line: Vec<String> = fields.collect();
    out.push_str(&line.join(","));
    out.push_str("\r\n");
}

fn csv_field(raw: &str) -> String {
    if raw.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("users"), "\"users\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_csv_quoting() {
        let columns = vec!["id".to_string(), "name".to_string(), "note".to_string()];
        let rows = vec![
            json!({"id": 1, "name": "Plain", "note": null}),
            json!({"id": 2, "name": "Comma, inside", "note": "say \"hi\""}),
            json!({"id": 3, "name": "multi\nline", "note": true}),
        ]
        .into_iter()
        .map(|v| match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        })
        .collect::<Vec<_>>();

        let csv = rows_to_csv(&columns, &rows);
        assert_eq!(
            csv,
            "id,name,note\r\n\
             1,Plain,\r\n\
             2,\"Comma, inside\",\"say \"\"hi\"\"\"\r\n\
             3,\"multi\nline\",true\r\n"
        );
    }

    #[test]
    fn test_to_hex() {
        assert_eq!(to_hex(&[0x00, 0xab, 0x10]), "00ab10");
    }

    #[tokio::test]
    async fn test_row_to_json_storage_classes() {
        let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
        let row = sqlx::query("SELECT 7 AS i, 1.5 AS r, 'txt' AS t, NULL AS n, x'0aff' AS b")
            .fetch_one(&pool)
            .await
            .unwrap();
        let object = row_to_json(&row);
        assert_eq!(
            Value::Object(object),
            json!({"i": 7, "r": 1.5, "t": "txt", "n": null, "b": "0aff"})
        );
    }
}
