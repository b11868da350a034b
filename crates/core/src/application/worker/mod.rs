// Worker - per-kind task execution loop

pub mod constants;
mod shutdown;

use constants::*;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::proxy_pool::ProxyPoolManager;
use crate::domain::{FetchError, FetchErrorKind, ProxyEndpoint, Task, TaskKind};
use crate::error::Result;
use crate::port::{FetchExecutor, ResultSink, TaskStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Bounded pool of executors for one task kind. Each executor runs an
/// independent claim loop, so a pool never holds more than `size` tasks of
/// its kind in PROCESSING at once. Kinds never share a pool; a stuck
/// product_crawl backlog cannot starve keyword searches.
pub struct WorkerPool {
    kind: TaskKind,
    size: usize,
    task_store: Arc<dyn TaskStore>,
    fetch_executor: Arc<dyn FetchExecutor>,
    proxy_pool: Arc<ProxyPoolManager>,
    result_sink: Arc<dyn ResultSink>,
    fetch_timeout: Duration,
}

impl WorkerPool {
    pub fn new(
        kind: TaskKind,
        size: usize,
        task_store: Arc<dyn TaskStore>,
        fetch_executor: Arc<dyn FetchExecutor>,
        proxy_pool: Arc<ProxyPoolManager>,
        result_sink: Arc<dyn ResultSink>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            kind,
            size,
            task_store,
            fetch_executor,
            proxy_pool,
            result_sink,
            fetch_timeout,
        }
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    /// Spawn `size` executor loops. Handles are returned so the daemon can
    /// await them during graceful shutdown.
    pub fn spawn(self: &Arc<Self>, shutdown: &ShutdownToken) -> Vec<JoinHandle<()>> {
        (0..self.size)
            .map(|executor_id| {
                let pool = Arc::clone(self);
                let token = shutdown.clone();
                tokio::spawn(async move {
                    pool.run_executor(executor_id, token).await;
                })
            })
            .collect()
    }

    async fn run_executor(&self, executor_id: usize, mut shutdown: ShutdownToken) {
        info!(kind = %self.kind, executor_id, "Worker executor started");
        loop {
            if shutdown.is_shutdown() {
                break;
            }
            match self.process_next_task().await {
                Ok(true) => {}
                Ok(false) => {
                    tokio::select! {
                        _ = sleep(IDLE_SLEEP_DURATION) => {},
                        _ = shutdown.wait() => break,
                    }
                }
                Err(e) => {
                    error!(kind = %self.kind, executor_id, error = %e, "Worker executor error");
                    tokio::select! {
                        _ = sleep(ERROR_RECOVERY_SLEEP_DURATION) => {},
                        _ = shutdown.wait() => break,
                    }
                }
            }
        }
        info!(kind = %self.kind, executor_id, "Worker executor stopped");
    }

    /// Claim and run one task. Returns false when nothing was claimable.
    pub async fn process_next_task(&self) -> Result<bool> {
        let Some(task) = self.task_store.claim_next(self.kind).await? else {
            return Ok(false);
        };

        info!(
            task_id = %task.id,
            kind = %task.kind,
            retry_count = task.retry_count,
            "Processing task"
        );

        let proxy = match self.proxy_pool.acquire() {
            Ok(proxy) => proxy,
            Err(e) => {
                // Pool exhaustion consumes a retry like any other failure;
                // the backoff gives the refresh loop time to recover.
                warn!(task_id = %task.id, "No usable proxy endpoint");
                self.task_store
                    .mark_failed(&task.id, e.kind.as_str(), &e.message)
                    .await?;
                return Ok(true);
            }
        };

        match self.execute_isolated(&task, &proxy).await {
            Ok(result) => {
                self.proxy_pool.report_outcome(&proxy.address, true);
                self.result_sink.persist(&task, result).await?;
                self.task_store.mark_completed(&task.id).await?;
                info!(task_id = %task.id, "Task completed");
            }
            Err(fetch_err) => {
                if fetch_err.kind.is_proxy_fault() {
                    self.proxy_pool.report_outcome(&proxy.address, false);
                }
                warn!(
                    task_id = %task.id,
                    error_type = %fetch_err.kind,
                    error = %fetch_err.message,
                    "Task attempt failed"
                );
                self.task_store
                    .mark_failed(&task.id, fetch_err.kind.as_str(), &fetch_err.message)
                    .await?;
            }
        }
        Ok(true)
    }

    /// Run the fetch inside tokio::task::spawn so an executor panic is
    /// caught by the JoinHandle instead of killing the daemon, bounded by
    /// the configured per-attempt timeout.
    async fn execute_isolated(
        &self,
        task: &Task,
        proxy: &ProxyEndpoint,
    ) -> std::result::Result<serde_json::Value, FetchError> {
        let fetch_executor = Arc::clone(&self.fetch_executor);
        let task = task.clone();
        let proxy = proxy.clone();
        let timeout = self.fetch_timeout;

        let handle = tokio::task::spawn(async move {
            tokio::time::timeout(timeout, fetch_executor.execute(&task, &proxy)).await
        });

        match handle.await {
            Ok(Ok(result)) => result,
            Ok(Err(_elapsed)) => Err(FetchError::timeout(format!(
                "fetch exceeded {}s",
                timeout.as_secs()
            ))),
            Err(join_err) => {
                // A panicked parse is the fetch payload's fault, not the
                // proxy's; it must not count against the endpoint.
                error!(join_error = %join_err, "Fetch execution panicked or was cancelled");
                Err(FetchError::new(
                    FetchErrorKind::Malformed,
                    format!("fetch execution aborted: {join_err}"),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::retry::RetryPolicy;
    use crate::domain::{NewTask, TaskPriority, TaskStatus};
    use crate::port::fetch_executor::mocks::MockFetchExecutor;
    use crate::port::id_provider::mocks::SequentialIdProvider;
    use crate::port::proxy_source::mocks::MockProxySource;
    use crate::port::result_sink::LoggingResultSink;
    use crate::port::task_store::mocks::InMemoryTaskStore;
    use crate::port::time_provider::mocks::MockTimeProvider;

    struct Fixture {
        pool: Arc<WorkerPool>,
        store: Arc<InMemoryTaskStore>,
        time: Arc<MockTimeProvider>,
    }

    async fn fixture(executor: MockFetchExecutor) -> Fixture {
        let time = Arc::new(MockTimeProvider::new(1_000_000));
        let store = Arc::new(InMemoryTaskStore::new(
            RetryPolicy::new(2, 60, 3),
            time.clone(),
            Arc::new(SequentialIdProvider::new()),
        ));
        let proxy_pool = Arc::new(ProxyPoolManager::new(
            Arc::new(MockProxySource::fixed(vec!["10.0.0.1:8080"])),
            time.clone(),
        ));
        proxy_pool.refresh().await.unwrap();

        let pool = Arc::new(WorkerPool::new(
            TaskKind::ProductCrawl,
            1,
            store.clone(),
            Arc::new(executor),
            proxy_pool,
            Arc::new(LoggingResultSink),
            Duration::from_secs(5),
        ));
        Fixture { pool, store, time }
    }

    fn product_task() -> NewTask {
        NewTask {
            kind: TaskKind::ProductCrawl,
            payload_ref: "https://example.com/product/1".to_string(),
            priority: TaskPriority::Normal,
            max_retries: 3,
        }
    }

    #[tokio::test]
    async fn completes_claimed_task_on_success() {
        let f = fixture(MockFetchExecutor::always_succeeding()).await;
        let id = f.store.enqueue(product_task()).await.unwrap();

        assert!(f.pool.process_next_task().await.unwrap());

        let task = f.store.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.completed_at.is_some());
        assert!(task.error_type.is_none());
    }

    #[tokio::test]
    async fn returns_false_when_nothing_claimable() {
        let f = fixture(MockFetchExecutor::always_succeeding()).await;
        assert!(!f.pool.process_next_task().await.unwrap());
    }

    #[tokio::test]
    async fn retries_transient_failures_then_completes() {
        let f = fixture(MockFetchExecutor::failing_times(
            2,
            FetchErrorKind::Network,
        ))
        .await;
        let id = f.store.enqueue(product_task()).await.unwrap();

        // attempt 1: fails, deferred by backoff
        assert!(f.pool.process_next_task().await.unwrap());
        let task = f.store.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.retry_count, 1);
        assert_eq!(task.error_type.as_deref(), Some("network"));

        // not yet eligible until the backoff elapses
        assert!(!f.pool.process_next_task().await.unwrap());

        f.time.advance(3_000);
        assert!(f.pool.process_next_task().await.unwrap());

        f.time.advance(5_000);
        assert!(f.pool.process_next_task().await.unwrap());

        let task = f.store.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.retry_count, 2);
        assert!(task.error_type.is_none());
    }

    #[tokio::test]
    async fn exhausted_retries_end_in_failed() {
        let f = fixture(MockFetchExecutor::failing_times(
            10,
            FetchErrorKind::Blocked,
        ))
        .await;
        let id = f.store.enqueue(product_task()).await.unwrap();

        for _ in 0..4 {
            f.time.advance(120_000);
            assert!(f.pool.process_next_task().await.unwrap());
        }

        let task = f.store.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.retry_count, 3);
        assert_eq!(task.error_type.as_deref(), Some("blocked"));

        f.time.advance(120_000);
        assert!(!f.pool.process_next_task().await.unwrap());
    }

    #[tokio::test]
    async fn empty_proxy_pool_defers_task_without_executing() {
        let time = Arc::new(MockTimeProvider::new(1_000_000));
        let store = Arc::new(InMemoryTaskStore::new(
            RetryPolicy::new(2, 60, 3),
            time.clone(),
            Arc::new(SequentialIdProvider::new()),
        ));
        let proxy_pool = Arc::new(ProxyPoolManager::new(
            Arc::new(MockProxySource::fixed(vec![])),
            time.clone(),
        ));
        proxy_pool.refresh().await.unwrap();

        let executor = Arc::new(MockFetchExecutor::always_succeeding());
        let pool = Arc::new(WorkerPool::new(
            TaskKind::ProductCrawl,
            1,
            store.clone(),
            executor.clone(),
            proxy_pool,
            Arc::new(LoggingResultSink),
            Duration::from_secs(5),
        ));

        let id = store.enqueue(product_task()).await.unwrap();
        assert!(pool.process_next_task().await.unwrap());

        assert_eq!(executor.call_count(), 0);
        let task = store.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.error_type.as_deref(), Some("no_proxy_available"));
    }

    #[tokio::test]
    async fn spawned_pool_drains_queue_and_stops_on_shutdown() {
        let f = fixture(MockFetchExecutor::always_succeeding()).await;
        for _ in 0..5 {
            f.store.enqueue(product_task()).await.unwrap();
        }

        let (sender, token) = shutdown_channel();
        let handles = f.pool.spawn(&token);

        // single executor drains five tasks well within the deadline
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let done = f
                .store
                .count_by_status(TaskKind::ProductCrawl, TaskStatus::Completed)
                .await
                .unwrap();
            if done == 5 {
                break;
            }
            assert!(tokio::time::Instant::now() < deadline, "queue not drained");
            sleep(Duration::from_millis(10)).await;
        }

        sender.shutdown();
        for handle in handles {
            handle.await.unwrap();
        }
    }
}
