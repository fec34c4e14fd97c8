//! SQL execution against PostgreSQL.
//!
//! One connection per request, one explicit transaction per statement. The
//! statement is passed verbatim — the caller is trusted to supply safe SQL
//! (this service is internal-only; see DESIGN.md on the trust boundary).
//! Statements that describe columns are treated as reads and fetched in full;
//! everything else is committed and acknowledged without rows.

use askdb_core::AskdbError;
use serde_json::{Map, Value};
use sqlx::postgres::{PgConnection, PgRow};
use sqlx::{Column, Connection, Executor, Row, TypeInfo, ValueRef};

/// What a statement produced.
#[derive(Debug)]
pub enum QueryOutcome {
    /// SELECT-like: every row as an ordered column-name → value mapping.
    Rows(Vec<Map<String, Value>>),
    /// Write-like: committed, no rows to return.
    Ack { rows_affected: u64 },
}

/// Execute one statement on a fresh connection.
///
/// Empty input is rejected before the database is touched. Any execution
/// failure rolls the transaction back; the connection is closed on every
/// path before returning.
pub async fn run_sql(database_url: &str, sql: &str) -> Result<QueryOutcome, AskdbError> {
    let sql = sql.trim();
    if sql.is_empty() {
        return Err(AskdbError::Validation("No SQL query provided".to_string()));
    }

    let mut conn = PgConnection::connect(database_url).await?;
    let outcome = execute_on(&mut conn, sql).await;
    conn.close().await.ok();
    outcome
}

async fn execute_on(conn: &mut PgConnection, sql: &str) -> Result<QueryOutcome, AskdbError> {
    let mut tx = conn.begin().await?;

    // Prepare first: statements with a described column set are reads.
    let described = match (&mut *tx).describe(sql).await {
        Ok(d) => d,
        Err(e) => {
            tx.rollback().await.ok();
            return Err(e.into());
        }
    };

    if !described.columns().is_empty() {
        match sqlx::query(sql).fetch_all(&mut *tx).await {
            Ok(rows) => {
                tx.commit().await?;
                let mut out = Vec::with_capacity(rows.len());
                for row in &rows {
                    out.push(row_to_json(row)?);
                }
                Ok(QueryOutcome::Rows(out))
            }
            Err(e) => {
                tx.rollback().await.ok();
                Err(e.into())
            }
        }
    } else {
        match sqlx::query(sql).execute(&mut *tx).await {
            Ok(result) => {
                tx.commit().await?;
                Ok(QueryOutcome::Ack {
                    rows_affected: result.rows_affected(),
                })
            }
            Err(e) => {
                tx.rollback().await.ok();
                Err(e.into())
            }
        }
    }
}

/// Connectivity probe used by `--health`.
pub async fn connectivity_check(database_url: &str) -> Result<String, sqlx::Error> {
    let mut conn = PgConnection::connect(database_url).await?;
    let row: (String,) = sqlx::query_as("SELECT version()").fetch_one(&mut conn).await?;
    conn.close().await.ok();
    Ok(row.0)
}

/// Convert one row into an ordered column-name → JSON value mapping.
/// Column order follows the statement's projection.
pub fn row_to_json(row: &PgRow) -> Result<Map<String, Value>, AskdbError> {
    let mut out = Map::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let value = decode_value(row, idx, column.type_info().name())?;
        out.insert(column.name().to_string(), value);
    }
    Ok(out)
}

/// Decode a single column by its postgres type name. SQL NULL maps to JSON
/// null for every type; NUMERIC keeps full precision by round-tripping
/// through its decimal text form.
fn decode_value(row: &PgRow, idx: usize, type_name: &str) -> Result<Value, AskdbError> {
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }

    let value = match type_name {
        "BOOL" => Value::Bool(row.try_get::<bool, _>(idx)?),
        "INT2" => Value::from(row.try_get::<i16, _>(idx)?),
        "INT4" => Value::from(row.try_get::<i32, _>(idx)?),
        "INT8" => Value::from(row.try_get::<i64, _>(idx)?),
        "FLOAT4" => Value::from(row.try_get::<f32, _>(idx)?),
        "FLOAT8" => Value::from(row.try_get::<f64, _>(idx)?),
        "NUMERIC" => {
            let n = row.try_get::<sqlx::types::BigDecimal, _>(idx)?;
            let text = n.to_string();
            text.parse::<serde_json::Number>()
                .map(Value::Number)
                .unwrap_or(Value::String(text))
        }
        "DATE" => Value::String(row.try_get::<chrono::NaiveDate, _>(idx)?.to_string()),
        "TIME" => Value::String(row.try_get::<chrono::NaiveTime, _>(idx)?.to_string()),
        "TIMESTAMP" => Value::String(row.try_get::<chrono::NaiveDateTime, _>(idx)?.to_string()),
        "TIMESTAMPTZ" => Value::String(
            row.try_get::<chrono::DateTime<chrono::Utc>, _>(idx)?
                .to_rfc3339(),
        ),
        "UUID" => Value::String(row.try_get::<uuid::Uuid, _>(idx)?.to_string()),
        "JSON" | "JSONB" => row.try_get::<Value, _>(idx)?,
        // TEXT, VARCHAR, BPCHAR, NAME and anything else textual
        _ => Value::String(row.try_get::<String, _>(idx)?),
    };

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_sql_is_rejected_without_a_database() {
        // The URL is unroutable on purpose: validation must happen first.
        let err = run_sql("postgres://nobody@256.0.0.1/none", "   ").await;
        match err {
            Err(AskdbError::Validation(msg)) => assert_eq!(msg, "No SQL query provided"),
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
