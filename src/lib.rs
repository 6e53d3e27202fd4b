//! Multi-connection database action engine: resolves pooled connections to
//! named databases, introspects table schema, executes generic row and raw
//! SQL operations, manages batched migrations, and generates source
//! artifacts from introspected tables.

pub mod action;
pub mod case;
pub mod coerce;
pub mod config;
pub mod engine;
pub mod error;
pub mod generate;
pub mod introspect;
pub mod migrate;
pub mod registry;
pub mod schema;
pub mod sql;
pub mod status;

pub use action::{RawOutcome, TableDefaults};
pub use config::{DatabaseConfig, EngineConfig};
pub use engine::Engine;
pub use error::{
    ColumnFault, ConfigError, ConnectionError, EngineError, GenerationError, MigrationError,
    SchemaError, ValidationError,
};
pub use generate::{
    qualified_name, ArtifactGenerator, ArtifactKind, ArtifactSpec, ArtifactStore, DirStore,
    GenerateOutcome,
};
pub use introspect::describe;
pub use migrate::{
    MigrationDef, MigrationManager, MigrationSource, MigrationStore, PgMigrationStore,
};
pub use registry::{Connect, ConnectionRegistry, PgConnector};
pub use schema::{ColumnDescriptor, SemanticType, TableSchema};
pub use status::{ConnectionStatus, MigrationStatus, StatusSnapshot};
