//! Generic table actions: count, insert-with-defaults, raw statement
//! execution. Everything here is one-shot against a resolved handle.

use crate::coerce::coerce;
use crate::error::{ColumnFault, EngineError, ValidationError};
use crate::schema::TableSchema;
use crate::sql::{self, BindValue};
use chrono::Utc;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern"));

/// Form-prefill defaults for an "insert new row" action.
#[derive(Debug, Serialize)]
pub struct TableDefaults {
    pub id: i64,
    pub current_date: String,
}

/// Reject table names that are not plain identifiers before they are spliced
/// into SQL text. Raw statements deliberately skip this (see `execute_raw`).
pub fn ensure_identifier(name: &str) -> Result<(), EngineError> {
    if IDENTIFIER_RE.is_match(name) {
        Ok(())
    } else {
        Err(EngineError::InvalidIdentifier(name.to_string()))
    }
}

/// Row count of one table.
pub async fn count(pool: &PgPool, table: &str) -> Result<i64, EngineError> {
    ensure_identifier(table)?;
    let sql = sql::count(table);
    tracing::debug!(sql = %sql, "count");
    let n: i64 = sqlx::query_scalar(&sql).fetch_one(pool).await?;
    Ok(n)
}

/// Prefill defaults: proposed id is `count + 1`, a display hint only. It is
/// racy under concurrent inserts and must never be treated as an allocated
/// key; the store's own key generation stays authoritative.
pub async fn defaults_for_table(pool: &PgPool, table: &str) -> Result<TableDefaults, EngineError> {
    let n = count(pool, table).await?;
    Ok(TableDefaults {
        id: n + 1,
        current_date: Utc::now().format("%Y-%m-%dT%H:%M").to_string(),
    })
}

/// Plan an insert: walk the schema in column order, coercing supplied values
/// and collecting EVERY fault instead of stopping at the first.
///
/// - supplied values are coerced against the column's semantic type;
/// - absent columns with a store default (or nullable) are omitted so the
///   store applies its own default;
/// - absent non-nullable columns without a default are
///   `MissingRequiredColumn`; primary keys are exempt and left to the store;
/// - keys that match no column pass through untyped and fail in the store,
///   whose error text surfaces unmodified.
pub fn plan_insert(
    schema: &TableSchema,
    values: &HashMap<String, Value>,
) -> Result<Vec<(String, BindValue)>, ValidationError> {
    let mut columns: Vec<(String, BindValue)> = Vec::new();
    let mut faults: Vec<ColumnFault> = Vec::new();

    for col in &schema.columns {
        match values.get(&col.name) {
            Some(v) if v.is_null() && !col.nullable && !col.has_default && !col.is_primary_key => {
                faults.push(ColumnFault::MissingRequiredColumn {
                    column: col.name.clone(),
                });
            }
            Some(v) => match coerce(v, col.semantic_type) {
                Ok(bind) => columns.push((col.name.clone(), bind)),
                Err(reason) => faults.push(ColumnFault::TypeCoercionFailed {
                    column: col.name.clone(),
                    expected: col.semantic_type,
                    reason,
                }),
            },
            None if !col.nullable && !col.has_default && !col.is_primary_key => {
                faults.push(ColumnFault::MissingRequiredColumn {
                    column: col.name.clone(),
                });
            }
            None => {}
        }
    }

    let known: std::collections::HashSet<&str> =
        schema.columns.iter().map(|c| c.name.as_str()).collect();
    let mut extras: Vec<&String> = values.keys().filter(|k| !known.contains(k.as_str())).collect();
    extras.sort();
    for key in extras {
        columns.push((key.clone(), BindValue::from_json(&values[key])));
    }

    if faults.is_empty() {
        Ok(columns)
    } else {
        Err(ValidationError { faults })
    }
}

/// Insert one row, deferring omitted defaulted columns to the store.
pub async fn insert_row(
    pool: &PgPool,
    schema: &TableSchema,
    values: &HashMap<String, Value>,
) -> Result<bool, EngineError> {
    ensure_identifier(&schema.table)?;
    let columns = plan_insert(schema, values)?;
    let q = sql::insert(&schema.table, &columns);
    tracing::debug!(sql = %q.sql, params = ?q.params, "insert");
    let mut query = sqlx::query(&q.sql);
    for p in &q.params {
        query = query.bind(p.clone());
    }
    let result = query.execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

/// Result of a raw statement: a materialized result set for reads, an
/// affected-row count for everything else.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum RawOutcome {
    Rows(Vec<Value>),
    Affected(u64),
}

impl fmt::Display for RawOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawOutcome::Rows(rows) => {
                let text = serde_json::to_string(rows).map_err(|_| fmt::Error)?;
                f.write_str(&text)
            }
            RawOutcome::Affected(n) => write!(f, "{}", n),
        }
    }
}

const READ_PREFIXES: &[&str] = &["SELECT", "WITH", "SHOW", "EXPLAIN", "VALUES", "TABLE"];

fn is_read_statement(statement: &str) -> bool {
    let head = statement.trim_start().to_ascii_uppercase();
    READ_PREFIXES.iter().any(|p| head.starts_with(p))
}

/// Execute an arbitrary statement. Trusted-input escape hatch: no parsing,
/// no injection protection — the caller vouches for the statement. Store
/// errors surface with their message unmodified.
pub async fn execute_raw(pool: &PgPool, statement: &str) -> Result<RawOutcome, EngineError> {
    tracing::debug!(sql = %statement, "raw statement");
    if is_read_statement(statement) {
        let rows = sqlx::query(statement).fetch_all(pool).await?;
        Ok(RawOutcome::Rows(rows.iter().map(row_to_json).collect()))
    } else {
        let result = sqlx::query(statement).execute(pool).await?;
        Ok(RawOutcome::Affected(result.rows_affected()))
    }
}

fn row_to_json(row: &sqlx::postgres::PgRow) -> Value {
    use sqlx::Column;
    use sqlx::Row;
    let mut map = serde_json::Map::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    Value::Object(map)
}

fn cell_to_value(row: &sqlx::postgres::PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<serde_json::Value>, _>(name) {
        return j;
    }
    Value::Null
}
