use async_trait::async_trait;
use dbadmin_engine::{
    Connect, ConnectionError, ConnectionRegistry, DatabaseConfig, EngineConfig,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct CountingConnector {
    attempts: AtomicUsize,
    fail: bool,
}

#[async_trait]
impl Connect for CountingConnector {
    type Handle = usize;

    async fn connect(&self, config: &DatabaseConfig) -> Result<usize, ConnectionError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        // Hold the connect open long enough for every caller to pile up.
        tokio::time::sleep(Duration::from_millis(50)).await;
        if self.fail {
            Err(ConnectionError::ConnectFailed {
                name: config.name.clone(),
                message: "refused".into(),
            })
        } else {
            Ok(attempt)
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn config(names: &[&str]) -> EngineConfig {
    EngineConfig {
        databases: names
            .iter()
            .map(|n| DatabaseConfig {
                name: n.to_string(),
                url: format!("postgres://localhost/{}", n),
                max_connections: 5,
            })
            .collect(),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_resolves_share_one_connect_attempt() {
    init_tracing();
    let registry = Arc::new(ConnectionRegistry::new(
        config(&["db1"]),
        CountingConnector {
            attempts: AtomicUsize::new(0),
            fail: false,
        },
    ));

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let registry = registry.clone();
        tasks.push(tokio::spawn(async move { registry.resolve("db1").await }));
    }
    let mut handles = Vec::new();
    for task in tasks {
        handles.push(task.await.unwrap().unwrap());
    }

    // Every caller observed the same handle from a single physical connect.
    assert!(handles.iter().all(|h| *h == handles[0]));
    assert_eq!(handles[0], 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_failures_share_the_same_error() {
    init_tracing();
    let registry = Arc::new(ConnectionRegistry::new(
        config(&["db1"]),
        CountingConnector {
            attempts: AtomicUsize::new(0),
            fail: true,
        },
    ));

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let registry = registry.clone();
        tasks.push(tokio::spawn(async move { registry.resolve("db1").await }));
    }
    let mut errors = 0;
    for task in tasks {
        let result = task.await.unwrap();
        assert!(matches!(
            result,
            Err(ConnectionError::ConnectFailed { ref name, .. }) if name == "db1"
        ));
        errors += 1;
    }
    assert_eq!(errors, 8);

    // A failed slot is evicted: the next resolve retries with a new attempt.
    let _ = registry.resolve("db1").await;
}

#[tokio::test]
async fn unknown_name_fails_without_connecting() {
    let registry = ConnectionRegistry::new(
        config(&["db1"]),
        CountingConnector {
            attempts: AtomicUsize::new(0),
            fail: false,
        },
    );
    let result = registry.resolve("db2").await;
    assert!(matches!(
        result,
        Err(ConnectionError::UnknownDatabase(ref n)) if n == "db2"
    ));
}

#[tokio::test]
async fn different_names_connect_independently() {
    let registry = ConnectionRegistry::new(
        config(&["db1", "db2"]),
        CountingConnector {
            attempts: AtomicUsize::new(0),
            fail: false,
        },
    );
    let a = registry.resolve("db1").await.unwrap();
    let b = registry.resolve("db2").await.unwrap();
    assert_ne!(a, b);

    // Repeat resolution reuses the pooled handle, never duplicates it.
    assert_eq!(registry.resolve("db1").await.unwrap(), a);
}
