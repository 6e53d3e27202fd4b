//! Template-driven artifact generation bound to one table. Non-destructive:
//! an existing file is never overwritten.

pub mod templates;

use crate::case::{singularize, to_pascal_case, to_snake_case};
use crate::error::GenerationError;
use crate::schema::TableSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The closed set of generatable artifacts, one rendering function each.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Model,
    Controller,
    Resource,
    Seeder,
    Factory,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 5] = [
        ArtifactKind::Model,
        ArtifactKind::Controller,
        ArtifactKind::Resource,
        ArtifactKind::Seeder,
        ArtifactKind::Factory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Model => "model",
            ArtifactKind::Controller => "controller",
            ArtifactKind::Resource => "resource",
            ArtifactKind::Seeder => "seeder",
            ArtifactKind::Factory => "factory",
        }
    }

    /// Module segment the artifact lives under.
    fn segment(&self) -> &'static str {
        match self {
            ArtifactKind::Model => "models",
            ArtifactKind::Controller => "controllers",
            ArtifactKind::Resource => "resources",
            ArtifactKind::Seeder => "seeders",
            ArtifactKind::Factory => "factories",
        }
    }
}

/// Bare type name for an artifact: `users` -> `User`, `UserController`,
/// `UserResource`, `UsersTableSeeder`, `UserFactory`.
pub fn type_name(kind: ArtifactKind, table: &str) -> String {
    let singular = to_pascal_case(&singularize(table));
    match kind {
        ArtifactKind::Model => singular,
        ArtifactKind::Controller => format!("{}Controller", singular),
        ArtifactKind::Resource => format!("{}Resource", singular),
        ArtifactKind::Seeder => format!("{}TableSeeder", to_pascal_case(table)),
        ArtifactKind::Factory => format!("{}Factory", singular),
    }
}

/// Fully qualified artifact name, deterministic in (kind, database, table).
/// Pure: usable for preview before generation.
pub fn qualified_name(kind: ArtifactKind, database: &str, table: &str) -> String {
    format!("{}::{}::{}", database, kind.segment(), type_name(kind, table))
}

/// Where and what to generate, derived deterministically from inputs.
#[derive(Clone, Debug, Serialize)]
pub struct ArtifactSpec {
    pub kind: ArtifactKind,
    pub qualified_name: String,
    pub path: PathBuf,
}

pub fn spec_for(kind: ArtifactKind, database: &str, table: &str, root: &Path) -> ArtifactSpec {
    let file = format!("{}.rs", to_snake_case(&type_name(kind, table)));
    ArtifactSpec {
        kind,
        qualified_name: qualified_name(kind, database, table),
        path: root.join(database).join(kind.segment()).join(file),
    }
}

/// File-storage collaborator for generated artifacts.
pub trait ArtifactStore: Send + Sync {
    fn exists(&self, path: &Path) -> bool;
    fn write(&self, path: &Path, content: &str) -> Result<(), GenerationError>;
}

/// Plain filesystem store. Paths arrive absolute or relative to the process
/// working directory; parent directories are created on write.
pub struct DirStore;

impl ArtifactStore for DirStore {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn write(&self, path: &Path, content: &str) -> Result<(), GenerationError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| GenerationError::WriteFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        }
        std::fs::write(path, content).map_err(|e| GenerationError::WriteFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum GenerateOutcome {
    Created(PathBuf),
    /// The target file already exists; generation left it untouched. A
    /// recoverable signal, not a failure: it protects hand-edited output.
    AlreadyExists(PathBuf),
}

pub struct ArtifactGenerator {
    root: PathBuf,
    store: Box<dyn ArtifactStore>,
}

impl ArtifactGenerator {
    pub fn new(root: impl Into<PathBuf>, store: Box<dyn ArtifactStore>) -> Self {
        ArtifactGenerator {
            root: root.into(),
            store,
        }
    }

    pub fn spec_for(&self, kind: ArtifactKind, database: &str, table: &str) -> ArtifactSpec {
        spec_for(kind, database, table, &self.root)
    }

    /// Render the artifact for an introspected schema and write it, unless
    /// the target file already exists.
    pub fn generate(
        &self,
        kind: ArtifactKind,
        schema: &TableSchema,
    ) -> Result<GenerateOutcome, GenerationError> {
        let spec = self.spec_for(kind, &schema.database, &schema.table);
        if self.store.exists(&spec.path) {
            tracing::debug!(path = %spec.path.display(), "artifact exists, leaving untouched");
            return Ok(GenerateOutcome::AlreadyExists(spec.path));
        }
        let content = templates::render(kind, &spec, schema);
        self.store.write(&spec.path, &content)?;
        tracing::info!(kind = kind.as_str(), path = %spec.path.display(), "generated artifact");
        Ok(GenerateOutcome::Created(spec.path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualified_names_follow_convention() {
        assert_eq!(
            qualified_name(ArtifactKind::Model, "main", "users"),
            "main::models::User"
        );
        assert_eq!(
            qualified_name(ArtifactKind::Controller, "main", "users"),
            "main::controllers::UserController"
        );
        assert_eq!(
            qualified_name(ArtifactKind::Resource, "main", "categories"),
            "main::resources::CategoryResource"
        );
        assert_eq!(
            qualified_name(ArtifactKind::Seeder, "main", "users"),
            "main::seeders::UsersTableSeeder"
        );
        assert_eq!(
            qualified_name(ArtifactKind::Factory, "logs", "events"),
            "logs::factories::EventFactory"
        );
    }

    #[test]
    fn qualified_name_is_deterministic() {
        let a = qualified_name(ArtifactKind::Model, "main", "users");
        let b = qualified_name(ArtifactKind::Model, "main", "users");
        assert_eq!(a, b);
    }

    #[test]
    fn spec_path_nests_by_database_and_segment() {
        let spec = spec_for(ArtifactKind::Seeder, "main", "users", Path::new("generated"));
        assert_eq!(
            spec.path,
            Path::new("generated/main/seeders/users_table_seeder.rs")
        );
    }
}
