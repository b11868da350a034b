// Operator Service
//
// The application-facing surface consumed by the RPC layer: enqueueing,
// inspection of failed tasks, batch retry, monitor catalog membership and
// the manual monitor batch.

use crate::application::trigger::enqueue_monitor_batch;
use crate::domain::{NewTask, Task, TaskId, TaskKind, TaskPriority};
use crate::error::{AppError, Result};
use crate::port::{BatchRetryOutcome, FailedTaskFilter, MonitorCatalog, TaskStore, TimeProvider};
use std::sync::Arc;
use tracing::info;

/// Hard cap on one batch retry request.
pub const MAX_BATCH_RETRY_IDS: usize = 1_000;

pub struct OperatorService {
    task_store: Arc<dyn TaskStore>,
    monitor_catalog: Arc<dyn MonitorCatalog>,
    time_provider: Arc<dyn TimeProvider>,
    default_max_retries: i32,
}

impl OperatorService {
    pub fn new(
        task_store: Arc<dyn TaskStore>,
        monitor_catalog: Arc<dyn MonitorCatalog>,
        time_provider: Arc<dyn TimeProvider>,
        default_max_retries: i32,
    ) -> Self {
        Self {
            task_store,
            monitor_catalog,
            time_provider,
            default_max_retries,
        }
    }

    pub async fn enqueue(
        &self,
        kind: TaskKind,
        payload_ref: String,
        priority: TaskPriority,
    ) -> Result<TaskId> {
        if payload_ref.trim().is_empty() {
            return Err(AppError::Validation("payload_ref must not be empty".into()));
        }
        let id = self
            .task_store
            .enqueue(NewTask {
                kind,
                payload_ref,
                priority,
                max_retries: self.default_max_retries,
            })
            .await?;
        info!(task_id = %id, kind = %kind, "Task enqueued");
        Ok(id)
    }

    pub async fn get_task(&self, id: &TaskId) -> Result<Task> {
        self.task_store
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Task {} not found", id)))
    }

    pub async fn list_failed(&self, filter: FailedTaskFilter) -> Result<Vec<Task>> {
        self.task_store.list_failed(filter).await
    }

    /// Reset the given FAILED tasks back to PENDING with a fresh retry
    /// budget. Ids in any other state are skipped, not errors.
    pub async fn batch_retry(&self, ids: &[TaskId]) -> Result<BatchRetryOutcome> {
        if ids.is_empty() {
            return Err(AppError::Validation("ids must not be empty".into()));
        }
        if ids.len() > MAX_BATCH_RETRY_IDS {
            return Err(AppError::Validation(format!(
                "batch retry limited to {} ids",
                MAX_BATCH_RETRY_IDS
            )));
        }
        let outcome = self.task_store.batch_retry(ids).await?;
        info!(
            success_count = outcome.success_count,
            skipped_count = outcome.skipped_count,
            "Batch retry applied"
        );
        Ok(outcome)
    }

    /// Put a record under daily monitoring.
    pub async fn add_monitored(&self, payload_ref: String) -> Result<()> {
        if payload_ref.trim().is_empty() {
            return Err(AppError::Validation("payload_ref must not be empty".into()));
        }
        self.monitor_catalog
            .add(&payload_ref, self.time_provider.now_millis())
            .await?;
        info!(payload_ref = %payload_ref, "Record added to monitoring");
        Ok(())
    }

    /// Take a record out of daily monitoring. Returns false if it was not
    /// monitored.
    pub async fn remove_monitored(&self, payload_ref: &str) -> Result<bool> {
        let removed = self.monitor_catalog.remove(payload_ref).await?;
        info!(payload_ref, removed, "Record removed from monitoring");
        Ok(removed)
    }

    /// Manual monitor batch, bypassing the daily schedule.
    pub async fn trigger_monitor_batch(&self) -> Result<u64> {
        let enqueued = enqueue_monitor_batch(
            &self.task_store,
            &self.monitor_catalog,
            self.default_max_retries,
        )
        .await?;
        info!(enqueued, "Manual monitor batch enqueued");
        Ok(enqueued)
    }
}
