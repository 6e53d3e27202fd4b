//! Caller-facing facade: the operation set the admin surface dispatches to,
//! as plain async methods returning serializable data. No HTTP here.

use crate::action::{self, RawOutcome, TableDefaults};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::generate::{ArtifactGenerator, ArtifactKind, GenerateOutcome};
use crate::introspect;
use crate::migrate::{MigrationManager, MigrationSource};
use crate::registry::{ConnectionRegistry, PgConnector};
use crate::schema::TableSchema;
use crate::status::{self, StatusSnapshot};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

pub struct Engine {
    registry: ConnectionRegistry<PgConnector>,
    migrations: MigrationManager,
    generator: ArtifactGenerator,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        migration_source: Arc<dyn MigrationSource>,
        generator: ArtifactGenerator,
    ) -> Self {
        Engine {
            registry: ConnectionRegistry::new(config, PgConnector),
            migrations: MigrationManager::new(migration_source),
            generator,
        }
    }

    /// Introspect a table's structure. Re-read on every call.
    pub async fn describe(&self, database: &str, table: &str) -> Result<TableSchema, EngineError> {
        let pool = self.registry.resolve(database).await?;
        Ok(introspect::describe(&pool, database, table).await?)
    }

    /// Form-prefill defaults for an "insert new row" action: a racy
    /// `count + 1` id hint and the current timestamp.
    pub async fn defaults_for_table(
        &self,
        database: &str,
        table: &str,
    ) -> Result<TableDefaults, EngineError> {
        let pool = self.registry.resolve(database).await?;
        action::defaults_for_table(&pool, table).await
    }

    /// Qualified names of every artifact kind bound to this table. Pure
    /// preview: nothing is generated or written.
    pub fn table_artifacts(&self, database: &str, table: &str) -> BTreeMap<&'static str, String> {
        ArtifactKind::ALL
            .iter()
            .map(|kind| {
                (
                    kind.as_str(),
                    crate::generate::qualified_name(*kind, database, table),
                )
            })
            .collect()
    }

    pub fn qualified_name(&self, kind: ArtifactKind, database: &str, table: &str) -> String {
        crate::generate::qualified_name(kind, database, table)
    }

    /// Insert one row, coercing values against the introspected schema.
    pub async fn insert_new_row(
        &self,
        database: &str,
        table: &str,
        values: &HashMap<String, Value>,
    ) -> Result<bool, EngineError> {
        let pool = self.registry.resolve(database).await?;
        let schema = introspect::describe(&pool, database, table).await?;
        action::insert_row(&pool, &schema, values).await
    }

    /// Run a raw SQL statement and render its outcome for transport.
    /// Trusted-input escape hatch; see `action::execute_raw`.
    pub async fn run_sql(&self, database: &str, statement: &str) -> Result<String, EngineError> {
        let pool = self.registry.resolve(database).await?;
        let outcome: RawOutcome = action::execute_raw(&pool, statement).await?;
        Ok(outcome.to_string())
    }

    /// Apply pending migrations; returns how many were applied.
    pub async fn run_migrations(&self, database: &str) -> Result<u64, EngineError> {
        let pool = self.registry.resolve(database).await?;
        self.migrations.run(&pool, database).await
    }

    /// Revert the latest batch; returns how many were reverted.
    pub async fn reset_migrations(&self, database: &str) -> Result<u64, EngineError> {
        let pool = self.registry.resolve(database).await?;
        self.migrations.reset(&pool, database).await
    }

    /// Generate one artifact from the table's current schema. Returns
    /// `AlreadyExists` rather than overwriting.
    pub async fn generate(
        &self,
        kind: ArtifactKind,
        database: &str,
        table: &str,
    ) -> Result<GenerateOutcome, EngineError> {
        let pool = self.registry.resolve(database).await?;
        let schema = introspect::describe(&pool, database, table).await?;
        Ok(self.generator.generate(kind, &schema)?)
    }

    /// Diagnostic snapshot of connection liveness and migration progress.
    pub async fn status(&self) -> StatusSnapshot {
        status::snapshot(&self.registry, &self.migrations).await
    }
}
