//! Diagnostic status snapshot. The one place connection errors become data
//! instead of propagating.

use crate::migrate::MigrationManager;
use crate::registry::{ConnectionRegistry, PgConnector};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Serialize)]
pub struct ConnectionStatus {
    pub name: String,
    pub reachable: bool,
}

#[derive(Debug, Serialize)]
pub struct MigrationStatus {
    pub pending: u64,
    pub applied_batches: u64,
}

#[derive(Debug, Serialize)]
pub struct StatusSnapshot {
    pub connections: Vec<ConnectionStatus>,
    pub migrations: BTreeMap<String, MigrationStatus>,
}

/// Probe every configured database and report liveness plus migration
/// progress. Never fails: an unreachable database reports `reachable: false`
/// and is omitted from the migrations map.
pub async fn snapshot(
    registry: &ConnectionRegistry<PgConnector>,
    migrations: &MigrationManager,
) -> StatusSnapshot {
    let mut connections = Vec::new();
    let mut migration_map = BTreeMap::new();

    for name in registry.database_names() {
        let reachable = match registry.resolve(&name).await {
            Ok(pool) => {
                let alive = sqlx::query("SELECT 1").execute(&pool).await.is_ok();
                if alive {
                    match migration_status(&pool, migrations).await {
                        Ok(status) => {
                            migration_map.insert(name.clone(), status);
                        }
                        Err(e) => {
                            tracing::warn!(database = %name, error = %e, "migration status unavailable");
                        }
                    }
                }
                alive
            }
            Err(e) => {
                tracing::warn!(database = %name, error = %e, "unreachable");
                false
            }
        };
        connections.push(ConnectionStatus { name, reachable });
    }

    StatusSnapshot {
        connections,
        migrations: migration_map,
    }
}

async fn migration_status(
    pool: &sqlx::PgPool,
    migrations: &MigrationManager,
) -> Result<MigrationStatus, crate::error::EngineError> {
    Ok(MigrationStatus {
        pending: migrations.pending_count(pool).await?,
        applied_batches: migrations.applied_batches(pool).await?,
    })
}
