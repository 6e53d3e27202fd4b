//! Structural description of a table, rebuilt on every introspection call.

use serde::Serialize;

/// Abstract column type category used for coercion and template rendering,
/// independent of the backing store's native type name.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Integer,
    Decimal,
    Text,
    Boolean,
    Timestamp,
    Date,
    Uuid,
    Json,
    Unknown,
}

impl SemanticType {
    /// Map a PostgreSQL `information_schema.columns.data_type` to a semantic
    /// type. Total: anything unrecognized becomes `Unknown`, never an error,
    /// so defaulting and generation never block on an unmapped type.
    pub fn from_pg(data_type: &str) -> Self {
        match data_type.to_ascii_lowercase().as_str() {
            "smallint" | "integer" | "bigint" | "smallserial" | "serial" | "bigserial" => {
                SemanticType::Integer
            }
            "numeric" | "decimal" | "real" | "double precision" | "money" => SemanticType::Decimal,
            "text" | "character varying" | "character" | "varchar" | "char" | "citext" => {
                SemanticType::Text
            }
            "boolean" => SemanticType::Boolean,
            "timestamp without time zone" | "timestamp with time zone" | "timestamp" => {
                SemanticType::Timestamp
            }
            "date" => SemanticType::Date,
            "uuid" => SemanticType::Uuid,
            "json" | "jsonb" => SemanticType::Json,
            _ => SemanticType::Unknown,
        }
    }

    /// Rust type used when rendering this column into a generated model.
    pub fn rust_type(&self) -> &'static str {
        match self {
            SemanticType::Integer => "i64",
            SemanticType::Decimal => "f64",
            SemanticType::Text => "String",
            SemanticType::Boolean => "bool",
            SemanticType::Timestamp => "chrono::NaiveDateTime",
            SemanticType::Date => "chrono::NaiveDate",
            SemanticType::Uuid => "uuid::Uuid",
            SemanticType::Json => "serde_json::Value",
            SemanticType::Unknown => "serde_json::Value",
        }
    }
}

/// One column as reported by introspection. Immutable once constructed.
#[derive(Clone, Debug, Serialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub semantic_type: SemanticType,
    pub nullable: bool,
    pub has_default: bool,
    pub default_value: Option<String>,
    pub is_primary_key: bool,
}

/// Ordered column layout of one table in one database. Never cached across
/// calls: tables can be altered externally between requests.
#[derive(Clone, Debug, Serialize)]
pub struct TableSchema {
    pub database: String,
    pub table: String,
    pub columns: Vec<ColumnDescriptor>,
    pub primary_key: Option<String>,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }
}
