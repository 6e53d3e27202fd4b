//! Typed errors for every engine subsystem.

use crate::schema::SemanticType;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("duplicate database name '{0}'")]
    DuplicateDatabase(String),
    #[error("invalid database name '{0}'")]
    InvalidName(String),
    #[error("database '{0}' has an empty url")]
    EmptyUrl(String),
    #[error("config load: {0}")]
    Load(String),
}

/// Connection resolution failures. Cloneable so one connect attempt's
/// outcome can be shared with every caller waiting on it.
#[derive(Error, Debug, Clone)]
pub enum ConnectionError {
    #[error("unknown database '{0}'")]
    UnknownDatabase(String),
    #[error("connect to '{name}' failed: {message}")]
    ConnectFailed { name: String, message: String },
}

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("table '{table}' not found in database '{database}'")]
    TableNotFound { database: String, table: String },
    #[error("introspection of '{table}' failed: {message}")]
    IntrospectionFailed { table: String, message: String },
}

/// One per-column fault. `insert_row` collects every fault before failing,
/// never just the first.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "fault", rename_all = "snake_case")]
pub enum ColumnFault {
    MissingRequiredColumn {
        column: String,
    },
    TypeCoercionFailed {
        column: String,
        expected: SemanticType,
        reason: String,
    },
}

impl ColumnFault {
    pub fn column(&self) -> &str {
        match self {
            ColumnFault::MissingRequiredColumn { column } => column,
            ColumnFault::TypeCoercionFailed { column, .. } => column,
        }
    }
}

#[derive(Error, Debug)]
#[error("{}", describe_faults(.faults))]
pub struct ValidationError {
    pub faults: Vec<ColumnFault>,
}

fn describe_faults(faults: &[ColumnFault]) -> String {
    let cols: Vec<&str> = faults.iter().map(|f| f.column()).collect();
    format!(
        "validation failed for {} column(s): {}",
        faults.len(),
        cols.join(", ")
    )
}

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("batch {batch} partially applied: '{failed_at}' failed after {applied} migration(s): {cause}")]
    PartialApply {
        batch: i64,
        failed_at: String,
        applied: u64,
        cause: String,
    },
    #[error("batch {batch} partially reverted: '{failed_at}' failed after {reverted} reversal(s): {cause}")]
    PartialRevert {
        batch: i64,
        failed_at: String,
        reverted: u64,
        cause: String,
    },
}

/// An existing target file is not an error: `generate` reports it through
/// `GenerateOutcome::AlreadyExists` and leaves the file untouched.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("write {}: {message}", .path.display())]
    WriteFailed { path: PathBuf, message: String },
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Migration(#[from] MigrationError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
}
