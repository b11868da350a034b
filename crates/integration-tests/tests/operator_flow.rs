//! Operator surface over the real SQLite stores: failed-task inspection,
//! batch retry, manual monitor batches and record locks.

use marketcrawl_core::application::{OperatorService, RecordLockManager, RetryPolicy};
use marketcrawl_core::domain::{LockOutcome, TaskId, TaskKind, TaskPriority, TaskStatus, UnlockOutcome};
use marketcrawl_core::port::id_provider::UuidProvider;
use marketcrawl_core::port::time_provider::mocks::MockTimeProvider;
use marketcrawl_core::port::time_provider::SystemTimeProvider;
use marketcrawl_core::port::{FailedTaskFilter, TaskStore, TimeProvider};
use marketcrawl_infra_sqlite::{
    create_pool, run_migrations, SqliteMonitorCatalog, SqliteRecordLockStore, SqliteTaskStore,
};
use std::sync::Arc;

const START_MILLIS: i64 = 1_700_000_000_000;

async fn setup(
    time: Arc<MockTimeProvider>,
) -> (Arc<SqliteTaskStore>, Arc<OperatorService>) {
    let pool = create_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();

    let store = Arc::new(SqliteTaskStore::new(
        pool.clone(),
        time.clone(),
        Arc::new(UuidProvider),
        RetryPolicy::new(2, 60, 3),
    ));
    let catalog = Arc::new(SqliteMonitorCatalog::new(pool));
    let operator = Arc::new(OperatorService::new(store.clone(), catalog, time, 3));
    (store, operator)
}

/// Claim and fail a task repeatedly until it lands in FAILED.
async fn drive_to_failed(
    store: &SqliteTaskStore,
    time: &MockTimeProvider,
    kind: TaskKind,
    id: &TaskId,
) {
    for _ in 0..10 {
        let claimed = store.claim_next(kind).await.unwrap();
        let Some(task) = claimed else {
            time.advance(120_000);
            continue;
        };
        assert_eq!(&task.id, id);
        store
            .mark_failed(id, "blocked", "HTTP 403 from target")
            .await
            .unwrap();
        let task = store.find_by_id(id).await.unwrap().unwrap();
        if task.status == TaskStatus::Failed {
            return;
        }
        time.advance(120_000);
    }
    panic!("Task never reached FAILED");
}

#[tokio::test]
async fn failed_tasks_can_be_listed_and_batch_retried() {
    let time = Arc::new(MockTimeProvider::new(START_MILLIS));
    let (store, operator) = setup(time.clone()).await;

    let failed_id = operator
        .enqueue(
            TaskKind::KeywordSearch,
            "film camera".to_string(),
            TaskPriority::Normal,
        )
        .await
        .unwrap();
    drive_to_failed(&store, &time, TaskKind::KeywordSearch, &failed_id).await;

    let pending_id = operator
        .enqueue(
            TaskKind::KeywordSearch,
            "turntable".to_string(),
            TaskPriority::Normal,
        )
        .await
        .unwrap();

    // Only the failed task shows up, and the error filter matches.
    let listed = operator
        .list_failed(FailedTaskFilter {
            kind: Some(TaskKind::KeywordSearch),
            error_contains: Some("403".to_string()),
            limit: None,
        })
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, failed_id);
    assert_eq!(listed[0].retry_count, 3);

    let empty = operator
        .list_failed(FailedTaskFilter {
            kind: None,
            error_contains: Some("timeout".to_string()),
            limit: None,
        })
        .await
        .unwrap();
    assert!(empty.is_empty());

    // Retry resets the failed task; the pending id and the unknown id are
    // skipped without erroring the batch.
    let outcome = operator
        .batch_retry(&[
            failed_id.clone(),
            pending_id.clone(),
            "no-such-task".to_string(),
        ])
        .await
        .unwrap();
    assert_eq!(outcome.success_count, 1);
    assert_eq!(outcome.skipped_count, 2);

    let retried = store.find_by_id(&failed_id).await.unwrap().unwrap();
    assert_eq!(retried.status, TaskStatus::Pending);
    assert_eq!(retried.retry_count, 0);
    assert!(retried.next_attempt_at <= time.now_millis());
}

#[tokio::test]
async fn manual_monitor_batch_enqueues_active_records() {
    let time = Arc::new(MockTimeProvider::new(START_MILLIS));
    let (store, operator) = setup(time.clone()).await;

    for item in ["items/1", "items/2", "items/3"] {
        operator
            .add_monitored(format!("https://market.example/{item}"))
            .await
            .unwrap();
    }
    assert!(operator
        .remove_monitored("https://market.example/items/2")
        .await
        .unwrap());
    assert!(!operator
        .remove_monitored("https://market.example/items/2")
        .await
        .unwrap());

    let enqueued = operator.trigger_monitor_batch().await.unwrap();
    assert_eq!(enqueued, 2);

    let count = store
        .count_by_status(TaskKind::MonitorCrawl, TaskStatus::Pending)
        .await
        .unwrap();
    assert_eq!(count, 2);
}

#[tokio::test]
async fn record_lock_round_trip_over_sqlite() {
    let pool = create_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();

    let locks = RecordLockManager::new(
        Arc::new(SqliteRecordLockStore::new(pool)),
        Arc::new(SystemTimeProvider),
    );

    assert_eq!(locks.try_lock("record-7", 11).await.unwrap(), LockOutcome::Acquired);
    assert_eq!(
        locks.try_lock("record-7", 22).await.unwrap(),
        LockOutcome::AlreadyLocked { by: Some(11) }
    );

    // Non-holder cannot release, privileged caller can.
    assert_eq!(
        locks.unlock("record-7", 22, false).await.unwrap(),
        UnlockOutcome::Forbidden
    );
    assert_eq!(
        locks.unlock("record-7", 22, true).await.unwrap(),
        UnlockOutcome::Unlocked
    );

    assert_eq!(locks.try_lock("record-7", 22).await.unwrap(), LockOutcome::Acquired);
}
