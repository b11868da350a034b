// Task Store Port (Interface)
//
// The single source of truth for the task lifecycle state machine. Only the
// store performs transitions; workers mutate nothing but the task they claim.

use crate::domain::{NewTask, Task, TaskId, TaskKind, TaskStatus};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Filters for operator inspection of failed tasks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FailedTaskFilter {
    pub kind: Option<TaskKind>,
    /// Substring match against error_message.
    pub error_contains: Option<String>,
    pub limit: Option<i64>,
}

/// Per-batch counts for operator batch retry. Ids not currently FAILED are
/// skipped and counted, never erroring the whole batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRetryOutcome {
    pub success_count: u64,
    pub skipped_count: u64,
}

/// Durable record of every unit of remote-fetch work.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Create a task in PENDING with retry_count=0 and next_attempt_at=now.
    /// Idempotency is the caller's responsibility; the store does not dedup.
    async fn enqueue(&self, spec: NewTask) -> Result<TaskId>;

    /// Atomically claim the next eligible PENDING task of the given kind:
    /// next_attempt_at <= now, ordered by priority then created_at (oldest
    /// first). Exactly one concurrent claimer wins per task.
    async fn claim_next(&self, kind: TaskKind) -> Result<Option<Task>>;

    /// PROCESSING -> COMPLETED. Clears error fields, sets completed_at.
    /// Calling on a task not in PROCESSING is an invariant violation:
    /// logged and surfaced, never silently ignored.
    async fn mark_completed(&self, id: &TaskId) -> Result<()>;

    /// PROCESSING -> PENDING (backoff-deferred) while retry_count <
    /// max_retries, otherwise PROCESSING -> FAILED (terminal). The error is
    /// recorded on the task regardless of branch.
    async fn mark_failed(&self, id: &TaskId, error_type: &str, error_message: &str)
        -> Result<()>;

    async fn find_by_id(&self, id: &TaskId) -> Result<Option<Task>>;

    /// Read-only query over FAILED tasks for operator inspection.
    async fn list_failed(&self, filter: FailedTaskFilter) -> Result<Vec<Task>>;

    /// For each id in FAILED: reset retry_count, next_attempt_at=now,
    /// status=PENDING. Other ids are skipped and counted.
    async fn batch_retry(&self, ids: &[TaskId]) -> Result<BatchRetryOutcome>;

    async fn count_by_status(&self, kind: TaskKind, status: TaskStatus) -> Result<i64>;

    /// Startup recovery: tasks orphaned in PROCESSING by a crash go back to
    /// PENDING. Returns the number of tasks requeued.
    async fn requeue_processing(&self) -> Result<u64>;
}

pub mod mocks {
    use super::*;
    use crate::application::retry::{RetryDecision, RetryPolicy};
    use crate::error::AppError;
    use crate::port::{IdProvider, TimeProvider};
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use tracing::error;

    /// In-memory task store for core unit tests. Mirrors the SQLite
    /// adapter's semantics, including atomic claims under the mutex.
    pub struct InMemoryTaskStore {
        tasks: Mutex<Vec<Task>>,
        retry_policy: RetryPolicy,
        time_provider: Arc<dyn TimeProvider>,
        id_provider: Arc<dyn IdProvider>,
    }

    impl InMemoryTaskStore {
        pub fn new(
            retry_policy: RetryPolicy,
            time_provider: Arc<dyn TimeProvider>,
            id_provider: Arc<dyn IdProvider>,
        ) -> Self {
            Self {
                tasks: Mutex::new(Vec::new()),
                retry_policy,
                time_provider,
                id_provider,
            }
        }

        pub async fn snapshot(&self) -> Vec<Task> {
            self.tasks.lock().await.clone()
        }
    }

    #[async_trait]
    impl TaskStore for InMemoryTaskStore {
        async fn enqueue(&self, spec: NewTask) -> Result<TaskId> {
            let id = self.id_provider.generate_id();
            let now = self.time_provider.now_millis();
            let task = Task::new(id.clone(), now, spec);
            self.tasks.lock().await.push(task);
            Ok(id)
        }

        async fn claim_next(&self, kind: TaskKind) -> Result<Option<Task>> {
            let now = self.time_provider.now_millis();
            let mut tasks = self.tasks.lock().await;

            let candidate = tasks
                .iter_mut()
                .filter(|t| {
                    t.kind == kind && t.status == TaskStatus::Pending && t.next_attempt_at <= now
                })
                .min_by(|a, b| {
                    a.priority
                        .rank()
                        .cmp(&b.priority.rank())
                        .then(a.created_at.cmp(&b.created_at))
                        .then(a.id.cmp(&b.id))
                });

            match candidate {
                Some(task) => {
                    task.claim(now)?;
                    Ok(Some(task.clone()))
                }
                None => Ok(None),
            }
        }

        async fn mark_completed(&self, id: &TaskId) -> Result<()> {
            let now = self.time_provider.now_millis();
            let mut tasks = self.tasks.lock().await;
            let task = tasks
                .iter_mut()
                .find(|t| &t.id == id)
                .ok_or_else(|| AppError::NotFound(format!("Task {} not found", id)))?;
            task.complete(now).map_err(|e| {
                error!(task_id = %id, error = %e, "mark_completed on unexpected state");
                AppError::InvalidState(e.to_string())
            })?;
            Ok(())
        }

        async fn mark_failed(
            &self,
            id: &TaskId,
            error_type: &str,
            error_message: &str,
        ) -> Result<()> {
            let now = self.time_provider.now_millis();
            let mut tasks = self.tasks.lock().await;
            let task = tasks
                .iter_mut()
                .find(|t| &t.id == id)
                .ok_or_else(|| AppError::NotFound(format!("Task {} not found", id)))?;

            let next_attempt_at =
                match self.retry_policy.decide(task.retry_count + 1, task.max_retries) {
                    RetryDecision::Retry { delay_secs } => now + delay_secs as i64 * 1_000,
                    RetryDecision::Fail => now,
                };

            task.fail(now, next_attempt_at, error_type, error_message)
                .map_err(|e| {
                    error!(task_id = %id, error = %e, "mark_failed on unexpected state");
                    AppError::InvalidState(e.to_string())
                })?;
            Ok(())
        }

        async fn find_by_id(&self, id: &TaskId) -> Result<Option<Task>> {
            Ok(self.tasks.lock().await.iter().find(|t| &t.id == id).cloned())
        }

        async fn list_failed(&self, filter: FailedTaskFilter) -> Result<Vec<Task>> {
            let tasks = self.tasks.lock().await;
            let limit = filter.limit.unwrap_or(50) as usize;
            Ok(tasks
                .iter()
                .filter(|t| t.status == TaskStatus::Failed)
                .filter(|t| filter.kind.map_or(true, |k| t.kind == k))
                .filter(|t| {
                    filter.error_contains.as_deref().map_or(true, |needle| {
                        t.error_message
                            .as_deref()
                            .map_or(false, |msg| msg.contains(needle))
                    })
                })
                .take(limit)
                .cloned()
                .collect())
        }

        async fn batch_retry(&self, ids: &[TaskId]) -> Result<BatchRetryOutcome> {
            let now = self.time_provider.now_millis();
            let mut tasks = self.tasks.lock().await;
            let mut outcome = BatchRetryOutcome::default();

            for id in ids {
                match tasks.iter_mut().find(|t| &t.id == id) {
                    Some(task) if task.status == TaskStatus::Failed => {
                        task.reset_for_retry(now)?;
                        outcome.success_count += 1;
                    }
                    _ => outcome.skipped_count += 1,
                }
            }
            Ok(outcome)
        }

        async fn count_by_status(&self, kind: TaskKind, status: TaskStatus) -> Result<i64> {
            Ok(self
                .tasks
                .lock()
                .await
                .iter()
                .filter(|t| t.kind == kind && t.status == status)
                .count() as i64)
        }

        async fn requeue_processing(&self) -> Result<u64> {
            let now = self.time_provider.now_millis();
            let mut tasks = self.tasks.lock().await;
            let mut requeued = 0;
            for task in tasks.iter_mut() {
                if task.status == TaskStatus::Processing {
                    task.status = TaskStatus::Pending;
                    task.next_attempt_at = now;
                    task.updated_at = now;
                    requeued += 1;
                }
            }
            Ok(requeued)
        }
    }
}
