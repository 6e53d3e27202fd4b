//! Table introspection against `information_schema`. Re-reads on every call;
//! schema may be altered externally between requests.

use crate::error::SchemaError;
use crate::schema::{ColumnDescriptor, SemanticType, TableSchema};
use sqlx::{PgPool, Row};

const COLUMNS_SQL: &str = "SELECT column_name, data_type, is_nullable, column_default \
     FROM information_schema.columns \
     WHERE table_schema = 'public' AND table_name = $1 \
     ORDER BY ordinal_position";

const PRIMARY_KEY_SQL: &str = "SELECT kcu.column_name \
     FROM information_schema.table_constraints tc \
     JOIN information_schema.key_column_usage kcu \
       ON tc.constraint_name = kcu.constraint_name AND tc.table_name = kcu.table_name \
     WHERE tc.table_schema = 'public' AND tc.table_name = $1 \
       AND tc.constraint_type = 'PRIMARY KEY' \
     ORDER BY kcu.ordinal_position";

/// Describe one table: ordered columns, semantic types, nullability,
/// defaults, and primary key. Fails with `TableNotFound` when the table has
/// no columns in this database.
pub async fn describe(
    pool: &PgPool,
    database: &str,
    table: &str,
) -> Result<TableSchema, SchemaError> {
    tracing::debug!(database = %database, table = %table, "introspecting table");

    let rows = sqlx::query(COLUMNS_SQL)
        .bind(table)
        .fetch_all(pool)
        .await
        .map_err(|e| SchemaError::IntrospectionFailed {
            table: table.to_string(),
            message: e.to_string(),
        })?;

    if rows.is_empty() {
        return Err(SchemaError::TableNotFound {
            database: database.to_string(),
            table: table.to_string(),
        });
    }

    let pk_rows = sqlx::query(PRIMARY_KEY_SQL)
        .bind(table)
        .fetch_all(pool)
        .await
        .map_err(|e| SchemaError::IntrospectionFailed {
            table: table.to_string(),
            message: e.to_string(),
        })?;
    let pk_columns: Vec<String> = pk_rows.iter().map(|r| r.get("column_name")).collect();
    // Single-column key only; composite keys leave primary_key unset.
    let primary_key = if pk_columns.len() == 1 {
        Some(pk_columns[0].clone())
    } else {
        None
    };

    let columns = rows
        .iter()
        .map(|row| {
            let name: String = row.get("column_name");
            let data_type: String = row.get("data_type");
            let nullable: String = row.get("is_nullable");
            let default_value: Option<String> = row.try_get("column_default").ok().flatten();
            let is_primary_key = pk_columns.iter().any(|pk| pk == &name);
            ColumnDescriptor {
                semantic_type: SemanticType::from_pg(&data_type),
                nullable: nullable == "YES",
                has_default: default_value.is_some(),
                default_value,
                is_primary_key,
                name,
            }
        })
        .collect();

    Ok(TableSchema {
        database: database.to_string(),
        table: table.to_string(),
        columns,
        primary_key,
    })
}
