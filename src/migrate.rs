//! Migration manager: applies pending migrations in order under batch
//! numbers, reverts the latest batch, and tracks state in a per-database
//! ledger table.

use crate::error::{EngineError, MigrationError};
use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// One migration known to the system: a stable identifier plus forward and
/// backward statement bodies. The source defines the total order.
#[derive(Clone, Debug)]
pub struct MigrationDef {
    pub id: String,
    pub up: String,
    pub down: String,
}

/// Collaborator that owns the ordered set of known migrations.
pub trait MigrationSource: Send + Sync {
    fn migrations(&self) -> Vec<MigrationDef>;
}

const LEDGER_TABLE: &str = "_engine_migrations";

/// Ledger access and statement execution seam. Everything `run`/`reset`
/// touch in the database goes through here, the same way the registry talks
/// to the driver through `Connect`.
#[async_trait]
pub trait MigrationStore: Send + Sync {
    async fn ensure_ledger(&self) -> Result<(), sqlx::Error>;
    async fn applied_ids(&self) -> Result<HashSet<String>, sqlx::Error>;
    async fn latest_batch(&self) -> Result<Option<i64>, sqlx::Error>;
    async fn in_batch(&self, batch: i64) -> Result<Vec<String>, sqlx::Error>;
    async fn distinct_batches(&self) -> Result<u64, sqlx::Error>;
    async fn execute(&self, statement: &str) -> Result<(), sqlx::Error>;
    async fn record(&self, id: &str, batch: i64) -> Result<(), sqlx::Error>;
    async fn erase(&self, id: &str) -> Result<(), sqlx::Error>;
}

/// Production store: the `_engine_migrations` table in the target database.
pub struct PgMigrationStore<'a> {
    pool: &'a PgPool,
}

impl<'a> PgMigrationStore<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        PgMigrationStore { pool }
    }
}

#[async_trait]
impl MigrationStore for PgMigrationStore<'_> {
    async fn ensure_ledger(&self) -> Result<(), sqlx::Error> {
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {} (\n  migration TEXT PRIMARY KEY,\n  batch BIGINT NOT NULL,\n  applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()\n)",
            LEDGER_TABLE
        ))
        .execute(self.pool)
        .await?;
        Ok(())
    }

    async fn applied_ids(&self) -> Result<HashSet<String>, sqlx::Error> {
        let ids: Vec<String> =
            sqlx::query_scalar(&format!("SELECT migration FROM {}", LEDGER_TABLE))
                .fetch_all(self.pool)
                .await?;
        Ok(ids.into_iter().collect())
    }

    async fn latest_batch(&self) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query_scalar(&format!("SELECT MAX(batch) FROM {}", LEDGER_TABLE))
            .fetch_one(self.pool)
            .await
    }

    async fn in_batch(&self, batch: i64) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar(&format!(
            "SELECT migration FROM {} WHERE batch = $1",
            LEDGER_TABLE
        ))
        .bind(batch)
        .fetch_all(self.pool)
        .await
    }

    async fn distinct_batches(&self) -> Result<u64, sqlx::Error> {
        let n: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(DISTINCT batch) FROM {}",
            LEDGER_TABLE
        ))
        .fetch_one(self.pool)
        .await?;
        Ok(n as u64)
    }

    async fn execute(&self, statement: &str) -> Result<(), sqlx::Error> {
        sqlx::query(statement).execute(self.pool).await?;
        Ok(())
    }

    async fn record(&self, id: &str, batch: i64) -> Result<(), sqlx::Error> {
        sqlx::query(&format!(
            "INSERT INTO {} (migration, batch) VALUES ($1, $2)",
            LEDGER_TABLE
        ))
        .bind(id)
        .bind(batch)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    async fn erase(&self, id: &str) -> Result<(), sqlx::Error> {
        sqlx::query(&format!(
            "DELETE FROM {} WHERE migration = $1",
            LEDGER_TABLE
        ))
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(())
    }
}

/// Applied-migration ledger plus per-database run/reset mutual exclusion.
/// Batches applied by one `run` call revert together as a unit.
pub struct MigrationManager {
    source: Arc<dyn MigrationSource>,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl MigrationManager {
    pub fn new(source: Arc<dyn MigrationSource>) -> Self {
        MigrationManager {
            source,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, database: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().expect("migration lock map poisoned");
        locks.entry(database.to_string()).or_default().clone()
    }

    /// Apply every pending migration in order under one new batch number,
    /// recording each success before attempting the next. A failure stops the
    /// batch; earlier successes stay applied and the error names the failed
    /// identifier. Nothing pending returns 0 without writing.
    pub async fn run(&self, pool: &PgPool, database: &str) -> Result<u64, EngineError> {
        self.run_on(&PgMigrationStore::new(pool), database).await
    }

    pub async fn run_on(
        &self,
        store: &dyn MigrationStore,
        database: &str,
    ) -> Result<u64, EngineError> {
        let lock = self.lock_for(database);
        let _guard = lock.lock().await;
        store.ensure_ledger().await?;

        let applied = store.applied_ids().await?;
        let pending = pending_of(&self.source.migrations(), &applied);
        if pending.is_empty() {
            tracing::debug!(database = %database, "no pending migrations");
            return Ok(0);
        }

        let batch = store.latest_batch().await?.unwrap_or(0) + 1;
        let mut count: u64 = 0;
        for def in pending {
            if let Err(e) = store.execute(&def.up).await {
                return Err(MigrationError::PartialApply {
                    batch,
                    failed_at: def.id.clone(),
                    applied: count,
                    cause: e.to_string(),
                }
                .into());
            }
            // The migration is applied at this point; a failed ledger write
            // still reports its batch and identifier for remediation.
            if let Err(e) = store.record(&def.id, batch).await {
                return Err(MigrationError::PartialApply {
                    batch,
                    failed_at: def.id.clone(),
                    applied: count,
                    cause: format!("applied but not recorded: {}", e),
                }
                .into());
            }
            tracing::info!(database = %database, migration = %def.id, batch, "applied");
            count += 1;
        }
        Ok(count)
    }

    /// Revert every migration in the highest batch, in strict reverse order.
    /// A failed reversal stops with `PartialRevert`; already-reverted entries
    /// stay reverted. No recorded batches returns 0.
    pub async fn reset(&self, pool: &PgPool, database: &str) -> Result<u64, EngineError> {
        self.reset_on(&PgMigrationStore::new(pool), database).await
    }

    pub async fn reset_on(
        &self,
        store: &dyn MigrationStore,
        database: &str,
    ) -> Result<u64, EngineError> {
        let lock = self.lock_for(database);
        let _guard = lock.lock().await;
        store.ensure_ledger().await?;

        let batch = match store.latest_batch().await? {
            Some(b) => b,
            None => return Ok(0),
        };
        let in_batch = store.in_batch(batch).await?;

        let known = self.source.migrations();
        let ordered = revert_order(&known, &in_batch);

        let mut count: u64 = 0;
        for id in ordered {
            let def = known.iter().find(|d| d.id == id);
            let down = match def {
                Some(d) => &d.down,
                None => {
                    return Err(MigrationError::PartialRevert {
                        batch,
                        failed_at: id.clone(),
                        reverted: count,
                        cause: "migration is recorded but unknown to the source".into(),
                    }
                    .into())
                }
            };
            if let Err(e) = store.execute(down).await {
                return Err(MigrationError::PartialRevert {
                    batch,
                    failed_at: id.clone(),
                    reverted: count,
                    cause: e.to_string(),
                }
                .into());
            }
            // Same contract as `run_on`: the reversal happened, so a failed
            // ledger erase still reports its batch and identifier.
            if let Err(e) = store.erase(&id).await {
                return Err(MigrationError::PartialRevert {
                    batch,
                    failed_at: id.clone(),
                    reverted: count,
                    cause: format!("reverted but still recorded: {}", e),
                }
                .into());
            }
            tracing::info!(database = %database, migration = %id, batch, "reverted");
            count += 1;
        }
        Ok(count)
    }

    /// Count of known-but-unapplied migrations.
    pub async fn pending_count(&self, pool: &PgPool) -> Result<u64, EngineError> {
        let store = PgMigrationStore::new(pool);
        store.ensure_ledger().await?;
        let applied = store.applied_ids().await?;
        Ok(pending_of(&self.source.migrations(), &applied).len() as u64)
    }

    /// Count of distinct recorded batches.
    pub async fn applied_batches(&self, pool: &PgPool) -> Result<u64, EngineError> {
        let store = PgMigrationStore::new(pool);
        store.ensure_ledger().await?;
        Ok(store.distinct_batches().await?)
    }
}

/// Known migrations not yet applied, in source order.
pub fn pending_of(known: &[MigrationDef], applied: &HashSet<String>) -> Vec<MigrationDef> {
    known
        .iter()
        .filter(|d| !applied.contains(&d.id))
        .cloned()
        .collect()
}

/// Order the members of one batch for reversal: source order, reversed.
/// Identifiers the source no longer knows sort strictly after every known
/// one, so the unknown-migration error surfaces only once everything
/// revertible was reverted.
pub fn revert_order(known: &[MigrationDef], in_batch: &[String]) -> Vec<String> {
    let index: HashMap<&str, usize> = known
        .iter()
        .enumerate()
        .map(|(i, d)| (d.id.as_str(), i))
        .collect();
    let mut ordered: Vec<String> = in_batch.to_vec();
    // Known ids rank 1.., unknown ids rank 0: descending puts unknowns last.
    ordered.sort_by_key(|id| {
        std::cmp::Reverse(index.get(id.as_str()).map(|i| i + 1).unwrap_or(0))
    });
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(id: &str) -> MigrationDef {
        MigrationDef {
            id: id.into(),
            up: format!("CREATE TABLE t_{} (id BIGINT)", id),
            down: format!("DROP TABLE t_{}", id),
        }
    }

    struct StaticSource(Vec<MigrationDef>);

    impl MigrationSource for StaticSource {
        fn migrations(&self) -> Vec<MigrationDef> {
            self.0.clone()
        }
    }

    fn manager(defs: Vec<MigrationDef>) -> MigrationManager {
        MigrationManager::new(Arc::new(StaticSource(defs)))
    }

    #[derive(Default)]
    struct FakeState {
        ledger: Vec<(String, i64)>,
        executed: Vec<String>,
        fail_execute_on: Option<String>,
        fail_record_on: Option<String>,
        fail_erase_on: Option<String>,
    }

    #[derive(Default)]
    struct FakeStore {
        state: Mutex<FakeState>,
    }

    impl FakeStore {
        fn ledger(&self) -> Vec<(String, i64)> {
            self.state.lock().unwrap().ledger.clone()
        }

        fn executed(&self) -> Vec<String> {
            self.state.lock().unwrap().executed.clone()
        }
    }

    #[async_trait]
    impl MigrationStore for FakeStore {
        async fn ensure_ledger(&self) -> Result<(), sqlx::Error> {
            Ok(())
        }

        async fn applied_ids(&self) -> Result<HashSet<String>, sqlx::Error> {
            let state = self.state.lock().unwrap();
            Ok(state.ledger.iter().map(|(id, _)| id.clone()).collect())
        }

        async fn latest_batch(&self) -> Result<Option<i64>, sqlx::Error> {
            let state = self.state.lock().unwrap();
            Ok(state.ledger.iter().map(|(_, b)| *b).max())
        }

        async fn in_batch(&self, batch: i64) -> Result<Vec<String>, sqlx::Error> {
            let state = self.state.lock().unwrap();
            Ok(state
                .ledger
                .iter()
                .filter(|(_, b)| *b == batch)
                .map(|(id, _)| id.clone())
                .collect())
        }

        async fn distinct_batches(&self) -> Result<u64, sqlx::Error> {
            let state = self.state.lock().unwrap();
            let batches: HashSet<i64> = state.ledger.iter().map(|(_, b)| *b).collect();
            Ok(batches.len() as u64)
        }

        async fn execute(&self, statement: &str) -> Result<(), sqlx::Error> {
            let mut state = self.state.lock().unwrap();
            if let Some(frag) = &state.fail_execute_on {
                if statement.contains(frag.as_str()) {
                    return Err(sqlx::Error::Protocol("syntax error".into()));
                }
            }
            state.executed.push(statement.to_string());
            Ok(())
        }

        async fn record(&self, id: &str, batch: i64) -> Result<(), sqlx::Error> {
            let mut state = self.state.lock().unwrap();
            if state.fail_record_on.as_deref() == Some(id) {
                return Err(sqlx::Error::Protocol("connection reset".into()));
            }
            state.ledger.push((id.to_string(), batch));
            Ok(())
        }

        async fn erase(&self, id: &str) -> Result<(), sqlx::Error> {
            let mut state = self.state.lock().unwrap();
            if state.fail_erase_on.as_deref() == Some(id) {
                return Err(sqlx::Error::Protocol("connection reset".into()));
            }
            state.ledger.retain(|(m, _)| m != id);
            Ok(())
        }
    }

    #[tokio::test]
    async fn run_applies_everything_under_one_batch() {
        let mgr = manager(vec![def("001_users"), def("002_posts")]);
        let store = FakeStore::default();
        let applied = mgr.run_on(&store, "main").await.unwrap();
        assert_eq!(applied, 2);
        assert_eq!(
            store.ledger(),
            [("001_users".to_string(), 1), ("002_posts".to_string(), 1)]
        );
        assert_eq!(
            store.executed(),
            [
                "CREATE TABLE t_001_users (id BIGINT)",
                "CREATE TABLE t_002_posts (id BIGINT)"
            ]
        );
    }

    #[tokio::test]
    async fn run_with_nothing_pending_returns_zero_without_writes() {
        let mgr = manager(vec![def("001_users")]);
        let store = FakeStore::default();
        assert_eq!(mgr.run_on(&store, "main").await.unwrap(), 1);
        let before = store.executed().len();
        assert_eq!(mgr.run_on(&store, "main").await.unwrap(), 0);
        assert_eq!(store.executed().len(), before);
        assert_eq!(store.distinct_batches().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn second_run_opens_a_new_batch_for_new_migrations() {
        let store = FakeStore::default();
        let mgr = manager(vec![def("001_users")]);
        mgr.run_on(&store, "main").await.unwrap();
        let mgr = manager(vec![def("001_users"), def("002_posts")]);
        assert_eq!(mgr.run_on(&store, "main").await.unwrap(), 1);
        assert_eq!(
            store.ledger(),
            [("001_users".to_string(), 1), ("002_posts".to_string(), 2)]
        );
    }

    #[tokio::test]
    async fn failed_up_stops_the_batch_and_keeps_earlier_successes() {
        let mgr = manager(vec![def("001_users"), def("002_posts"), def("003_tags")]);
        let store = FakeStore::default();
        store.state.lock().unwrap().fail_execute_on = Some("t_002_posts (id".into());

        let err = mgr.run_on(&store, "main").await.unwrap_err();
        match err {
            EngineError::Migration(MigrationError::PartialApply {
                batch,
                failed_at,
                applied,
                ..
            }) => {
                assert_eq!(batch, 1);
                assert_eq!(failed_at, "002_posts");
                assert_eq!(applied, 1);
            }
            other => panic!("expected PartialApply, got {:?}", other),
        }
        // 001 stays applied, 003 was never attempted.
        assert_eq!(store.ledger(), [("001_users".to_string(), 1)]);
        assert_eq!(store.executed().len(), 1);
    }

    #[tokio::test]
    async fn failed_ledger_write_reports_batch_and_identifier() {
        let mgr = manager(vec![def("001_users"), def("002_posts")]);
        let store = FakeStore::default();
        store.state.lock().unwrap().fail_record_on = Some("002_posts".into());

        let err = mgr.run_on(&store, "main").await.unwrap_err();
        match err {
            EngineError::Migration(MigrationError::PartialApply {
                batch,
                failed_at,
                applied,
                cause,
            }) => {
                assert_eq!(batch, 1);
                assert_eq!(failed_at, "002_posts");
                assert_eq!(applied, 1);
                assert!(cause.contains("applied but not recorded"));
            }
            other => panic!("expected PartialApply, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn reset_with_no_batches_returns_zero() {
        let mgr = manager(vec![def("001_users")]);
        let store = FakeStore::default();
        assert_eq!(mgr.reset_on(&store, "main").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn reset_reverts_only_the_latest_batch_in_reverse_order() {
        let store = FakeStore::default();
        let mgr = manager(vec![def("001_users")]);
        mgr.run_on(&store, "main").await.unwrap();
        let mgr = manager(vec![def("001_users"), def("002_posts"), def("003_tags")]);
        mgr.run_on(&store, "main").await.unwrap();

        assert_eq!(mgr.reset_on(&store, "main").await.unwrap(), 2);
        // Batch 2 reverted newest-first; batch 1 untouched.
        assert_eq!(store.ledger(), [("001_users".to_string(), 1)]);
        let executed = store.executed();
        let downs: Vec<&str> = executed
            .iter()
            .filter(|s| s.starts_with("DROP"))
            .map(String::as_str)
            .collect();
        assert_eq!(downs, ["DROP TABLE t_003_tags", "DROP TABLE t_002_posts"]);
    }

    #[tokio::test]
    async fn run_then_reset_empties_a_single_batch_history() {
        let mgr = manager(vec![def("001_users")]);
        let store = FakeStore::default();
        mgr.run_on(&store, "main").await.unwrap();
        assert_eq!(mgr.run_on(&store, "main").await.unwrap(), 0);
        assert_eq!(mgr.reset_on(&store, "main").await.unwrap(), 1);
        assert_eq!(store.distinct_batches().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_down_leaves_earlier_reversals_reverted() {
        let mgr = manager(vec![def("001_users"), def("002_posts")]);
        let store = FakeStore::default();
        mgr.run_on(&store, "main").await.unwrap();
        store.state.lock().unwrap().fail_execute_on = Some("DROP TABLE t_001_users".into());

        let err = mgr.reset_on(&store, "main").await.unwrap_err();
        match err {
            EngineError::Migration(MigrationError::PartialRevert {
                batch,
                failed_at,
                reverted,
                ..
            }) => {
                assert_eq!(batch, 1);
                assert_eq!(failed_at, "001_users");
                assert_eq!(reverted, 1);
            }
            other => panic!("expected PartialRevert, got {:?}", other),
        }
        // 002 is gone from the ledger, 001 remains.
        assert_eq!(store.ledger(), [("001_users".to_string(), 1)]);
    }

    #[tokio::test]
    async fn failed_ledger_erase_reports_batch_and_identifier() {
        let mgr = manager(vec![def("001_users"), def("002_posts")]);
        let store = FakeStore::default();
        mgr.run_on(&store, "main").await.unwrap();
        store.state.lock().unwrap().fail_erase_on = Some("002_posts".into());

        let err = mgr.reset_on(&store, "main").await.unwrap_err();
        match err {
            EngineError::Migration(MigrationError::PartialRevert {
                batch,
                failed_at,
                reverted,
                cause,
            }) => {
                assert_eq!(batch, 1);
                assert_eq!(failed_at, "002_posts");
                assert_eq!(reverted, 0);
                assert!(cause.contains("reverted but still recorded"));
            }
            other => panic!("expected PartialRevert, got {:?}", other),
        }
    }

    #[test]
    fn pending_preserves_source_order() {
        let known = vec![def("001_users"), def("002_posts"), def("003_tags")];
        let applied: HashSet<String> = ["001_users".to_string()].into_iter().collect();
        let pending = pending_of(&known, &applied);
        let ids: Vec<&str> = pending.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["002_posts", "003_tags"]);
    }

    #[test]
    fn pending_is_empty_when_everything_applied() {
        let known = vec![def("001_users")];
        let applied: HashSet<String> = ["001_users".to_string()].into_iter().collect();
        assert!(pending_of(&known, &applied).is_empty());
    }

    #[test]
    fn revert_runs_in_reverse_source_order() {
        let known = vec![def("001_users"), def("002_posts"), def("003_tags")];
        let in_batch = vec!["002_posts".to_string(), "003_tags".to_string()];
        assert_eq!(revert_order(&known, &in_batch), ["003_tags", "002_posts"]);
    }

    #[test]
    fn revert_order_is_stable_for_unordered_input() {
        let known = vec![def("001_users"), def("002_posts")];
        let in_batch = vec!["001_users".to_string(), "002_posts".to_string()];
        assert_eq!(revert_order(&known, &in_batch), ["002_posts", "001_users"]);
    }

    #[test]
    fn revert_order_puts_unknown_ids_strictly_last() {
        let known = vec![def("001_users"), def("002_posts")];
        // "000_ghost" is recorded but no longer known; even the very first
        // known migration must revert before it.
        let in_batch = vec![
            "000_ghost".to_string(),
            "001_users".to_string(),
            "002_posts".to_string(),
        ];
        assert_eq!(
            revert_order(&known, &in_batch),
            ["002_posts", "001_users", "000_ghost"]
        );
    }
}
