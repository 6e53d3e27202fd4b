//! Named database definitions: the set of logical databases the engine may resolve.

use crate::error::ConfigError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").expect("database name pattern"));

fn default_max_connections() -> u32 {
    5
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub name: String,
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub databases: Vec<DatabaseConfig>,
}

impl EngineConfig {
    /// Read databases from the `DATABASE_URLS` env var, a comma-separated list
    /// of `name=url` pairs (e.g. `main=postgres://localhost/app,logs=postgres://localhost/logs`).
    /// A plain `DATABASE_URL` is accepted as a single database named `default`.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let mut databases = Vec::new();
        if let Ok(urls) = std::env::var("DATABASE_URLS") {
            for pair in urls.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                let (name, url) = pair
                    .split_once('=')
                    .ok_or_else(|| ConfigError::Load(format!("expected name=url, got '{}'", pair)))?;
                databases.push(DatabaseConfig {
                    name: name.trim().to_string(),
                    url: url.trim().to_string(),
                    max_connections: default_max_connections(),
                });
            }
        } else if let Ok(url) = std::env::var("DATABASE_URL") {
            databases.push(DatabaseConfig {
                name: "default".into(),
                url,
                max_connections: default_max_connections(),
            });
        }
        let config = EngineConfig { databases };
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig =
            serde_json::from_str(text).map_err(|e| ConfigError::Load(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject duplicate names, empty urls, and names that are not plain identifiers.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = std::collections::HashSet::new();
        for db in &self.databases {
            if !NAME_RE.is_match(&db.name) {
                return Err(ConfigError::InvalidName(db.name.clone()));
            }
            if db.url.trim().is_empty() {
                return Err(ConfigError::EmptyUrl(db.name.clone()));
            }
            if !seen.insert(db.name.as_str()) {
                return Err(ConfigError::DuplicateDatabase(db.name.clone()));
            }
        }
        Ok(())
    }
}
