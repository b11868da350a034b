//! Concurrent claim safety against the real SQLite store.
//!
//! Uses a file-backed database so every pooled connection sees the same
//! data under WAL.

use marketcrawl_core::application::RetryPolicy;
use marketcrawl_core::domain::{NewTask, TaskKind, TaskPriority};
use marketcrawl_core::port::id_provider::UuidProvider;
use marketcrawl_core::port::time_provider::SystemTimeProvider;
use marketcrawl_core::port::TaskStore;
use marketcrawl_infra_sqlite::{create_pool, run_migrations, SqliteTaskStore};
use std::sync::Arc;

struct TempDb {
    path: std::path::PathBuf,
}

impl TempDb {
    fn new(label: &str) -> Self {
        let path = std::env::temp_dir().join(format!(
            "marketcrawl-test-{}-{}-{}.db",
            label,
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        Self { path }
    }

    fn url(&self) -> String {
        self.path.display().to_string()
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
        let _ = std::fs::remove_file(self.path.with_extension("db-wal"));
        let _ = std::fs::remove_file(self.path.with_extension("db-shm"));
    }
}

async fn setup(db: &TempDb) -> Arc<SqliteTaskStore> {
    let pool = create_pool(&db.url()).await.unwrap();
    run_migrations(&pool).await.unwrap();
    Arc::new(SqliteTaskStore::new(
        pool,
        Arc::new(SystemTimeProvider),
        Arc::new(UuidProvider),
        RetryPolicy::new(2, 60, 3),
    ))
}

#[tokio::test]
async fn concurrent_claimers_each_win_exactly_one_task() {
    let db = TempDb::new("concurrent-claim");
    let store = setup(&db).await;

    let mut enqueued = Vec::new();
    for i in 0..10 {
        let id = store
            .enqueue(NewTask {
                kind: TaskKind::ProductCrawl,
                payload_ref: format!("https://market.example/items/{}", i),
                priority: TaskPriority::Normal,
                max_retries: 3,
            })
            .await
            .unwrap();
        enqueued.push(id);
    }

    let mut handles = Vec::new();
    for claimer_id in 0..10 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            match store.claim_next(TaskKind::ProductCrawl).await {
                Ok(Some(task)) => {
                    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                    Some(task.id)
                }
                Ok(None) => None,
                Err(e) => panic!("Claimer {} failed: {}", claimer_id, e),
            }
        }));
    }

    let mut claimed = Vec::new();
    for handle in handles {
        if let Some(id) = handle.await.unwrap() {
            claimed.push(id);
        }
    }

    assert_eq!(claimed.len(), 10, "All 10 tasks should be claimed");
    claimed.sort();
    claimed.dedup();
    assert_eq!(claimed.len(), 10, "No task may be claimed twice");

    // Queue drained: the next claim comes back empty.
    assert!(store
        .claim_next(TaskKind::ProductCrawl)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn claimers_do_not_cross_kinds() {
    let db = TempDb::new("kind-isolation");
    let store = setup(&db).await;

    store
        .enqueue(NewTask {
            kind: TaskKind::KeywordSearch,
            payload_ref: "vintage lens".to_string(),
            priority: TaskPriority::Normal,
            max_retries: 3,
        })
        .await
        .unwrap();

    assert!(store
        .claim_next(TaskKind::MonitorCrawl)
        .await
        .unwrap()
        .is_none());

    let claimed = store
        .claim_next(TaskKind::KeywordSearch)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(claimed.kind, TaskKind::KeywordSearch);
}
