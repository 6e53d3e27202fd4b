//! Connection registry: resolves a logical database name to a live, pooled
//! handle. One handle per name, opened lazily on first resolve.

use crate::config::{DatabaseConfig, EngineConfig};
use crate::error::ConnectionError;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

/// Driver seam: opens one physical connection pool for a configured database.
#[async_trait]
pub trait Connect: Send + Sync + 'static {
    type Handle: Clone + Send + Sync + 'static;

    async fn connect(&self, config: &DatabaseConfig) -> Result<Self::Handle, ConnectionError>;
}

/// Production connector: a sqlx PostgreSQL pool per database.
pub struct PgConnector;

#[async_trait]
impl Connect for PgConnector {
    type Handle = PgPool;

    async fn connect(&self, config: &DatabaseConfig) -> Result<PgPool, ConnectionError> {
        tracing::info!(database = %config.name, "opening connection pool");
        PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .map_err(|e| ConnectionError::ConnectFailed {
                name: config.name.clone(),
                message: e.to_string(),
            })
    }
}

type Slot<H> = Arc<OnceCell<Result<H, ConnectionError>>>;

/// Owns every connection handle. Resolution is single-flight per name:
/// concurrent first-time resolutions perform exactly one physical connect,
/// and every waiter observes that attempt's result. A failed slot is evicted
/// afterwards so a later resolve may retry with a fresh attempt.
pub struct ConnectionRegistry<C: Connect = PgConnector> {
    connector: C,
    databases: HashMap<String, DatabaseConfig>,
    slots: Mutex<HashMap<String, Slot<C::Handle>>>,
}

impl<C: Connect> ConnectionRegistry<C> {
    pub fn new(config: EngineConfig, connector: C) -> Self {
        let databases = config
            .databases
            .into_iter()
            .map(|db| (db.name.clone(), db))
            .collect();
        ConnectionRegistry {
            connector,
            databases,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Configured database names, sorted for stable reporting.
    pub fn database_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.databases.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn config_for(&self, name: &str) -> Option<&DatabaseConfig> {
        self.databases.get(name)
    }

    /// Resolve a name to its pooled handle, connecting on first use.
    pub async fn resolve(&self, name: &str) -> Result<C::Handle, ConnectionError> {
        let config = self
            .databases
            .get(name)
            .ok_or_else(|| ConnectionError::UnknownDatabase(name.to_string()))?;

        let slot = {
            let mut slots = self.slots.lock().expect("registry slot map poisoned");
            slots.entry(name.to_string()).or_default().clone()
        };

        let result = slot
            .get_or_init(|| async { self.connector.connect(config).await })
            .await
            .clone();

        if result.is_err() {
            // Drop the failed slot unless another caller already replaced it.
            let mut slots = self.slots.lock().expect("registry slot map poisoned");
            if let Some(current) = slots.get(name) {
                if Arc::ptr_eq(current, &slot) {
                    slots.remove(name);
                }
            }
        }
        result
    }
}
