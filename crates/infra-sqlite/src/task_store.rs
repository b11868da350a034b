// SQLite TaskStore Implementation

use crate::map_sqlx_error;
use async_trait::async_trait;
use marketcrawl_core::application::retry::{RetryDecision, RetryPolicy};
use marketcrawl_core::domain::{NewTask, Task, TaskId, TaskKind, TaskPriority, TaskStatus};
use marketcrawl_core::error::{AppError, Result};
use marketcrawl_core::port::{
    BatchRetryOutcome, FailedTaskFilter, IdProvider, TaskStore, TimeProvider,
};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::error;

const DEFAULT_LIST_LIMIT: i64 = 50;

pub struct SqliteTaskStore {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
    id_provider: Arc<dyn IdProvider>,
    retry_policy: RetryPolicy,
}

impl SqliteTaskStore {
    pub fn new(
        pool: SqlitePool,
        time_provider: Arc<dyn TimeProvider>,
        id_provider: Arc<dyn IdProvider>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            pool,
            time_provider,
            id_provider,
            retry_policy,
        }
    }

    async fn current_status(&self, id: &TaskId) -> Result<Option<String>> {
        sqlx::query_scalar("SELECT status FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }

    /// A conditional UPDATE that touched zero rows means the caller tried a
    /// transition the state machine forbids. Diagnose and surface it.
    async fn transition_violation(&self, id: &TaskId, target: &str) -> AppError {
        match self.current_status(id).await {
            Ok(None) => AppError::NotFound(format!("Task {} not found", id)),
            Ok(Some(current)) => {
                error!(
                    task_id = %id,
                    current_status = %current,
                    target,
                    "Task transition attempted from unexpected state"
                );
                AppError::InvalidState(format!(
                    "Cannot transition task {} from {} to {}",
                    id, current, target
                ))
            }
            Err(e) => e,
        }
    }
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn enqueue(&self, spec: NewTask) -> Result<TaskId> {
        let id = self.id_provider.generate_id();
        let now = self.time_provider.now_millis();

        sqlx::query(
            r#"
            INSERT INTO tasks (
                id, kind, payload_ref, status, priority,
                retry_count, max_retries, next_attempt_at,
                error_type, error_message,
                created_at, updated_at, completed_at
            ) VALUES (?, ?, ?, ?, ?, 0, ?, ?, NULL, NULL, ?, ?, NULL)
            "#,
        )
        .bind(&id)
        .bind(spec.kind.as_str())
        .bind(&spec.payload_ref)
        .bind(TaskStatus::Pending.to_string())
        .bind(spec.priority.as_str())
        .bind(spec.max_retries)
        .bind(now)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(id)
    }

    async fn claim_next(&self, kind: TaskKind) -> Result<Option<Task>> {
        let now = self.time_provider.now_millis();

        // Single-statement claim: concurrent claimers cannot double-win
        // because the subselect and the status flip are one atomic UPDATE.
        let row = sqlx::query_as::<_, TaskRow>(
            r#"
            UPDATE tasks
            SET status = 'PROCESSING', updated_at = ?
            WHERE id = (
                SELECT t.id FROM tasks t
                WHERE t.kind = ? AND t.status = 'PENDING' AND t.next_attempt_at <= ?
                ORDER BY
                    CASE t.priority WHEN 'high' THEN 0 WHEN 'normal' THEN 1 ELSE 2 END ASC,
                    t.created_at ASC,
                    t.id ASC
                LIMIT 1
            )
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(kind.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(|r| r.into_task()).transpose()
    }

    async fn mark_completed(&self, id: &TaskId) -> Result<()> {
        let now = self.time_provider.now_millis();

        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET status = 'COMPLETED', error_type = NULL, error_message = NULL,
                completed_at = ?, updated_at = ?
            WHERE id = ? AND status = 'PROCESSING'
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(self.transition_violation(id, "COMPLETED").await);
        }
        Ok(())
    }

    async fn mark_failed(
        &self,
        id: &TaskId,
        error_type: &str,
        error_message: &str,
    ) -> Result<()> {
        let now = self.time_provider.now_millis();

        // Only the claiming worker calls mark_failed for a PROCESSING task,
        // so the read-then-update pair is race-free in practice; the
        // conditional UPDATE still catches any violation.
        let counters: Option<(i32, i32)> =
            sqlx::query_as("SELECT retry_count, max_retries FROM tasks WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        let Some((retry_count, max_retries)) = counters else {
            return Err(AppError::NotFound(format!("Task {} not found", id)));
        };

        let (status, new_retry_count, next_attempt_at) =
            match self.retry_policy.decide(retry_count + 1, max_retries) {
                RetryDecision::Retry { delay_secs } => {
                    // Saturate: an operator-configured backoff ceiling can
                    // push the deadline past what fits in epoch millis.
                    let delay_millis = i64::try_from(delay_secs)
                        .unwrap_or(i64::MAX)
                        .saturating_mul(1_000);
                    ("PENDING", retry_count + 1, now.saturating_add(delay_millis))
                }
                RetryDecision::Fail => ("FAILED", retry_count, now),
            };

        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET status = ?, retry_count = ?, next_attempt_at = ?,
                error_type = ?, error_message = ?, updated_at = ?
            WHERE id = ? AND status = 'PROCESSING'
            "#,
        )
        .bind(status)
        .bind(new_retry_count)
        .bind(next_attempt_at)
        .bind(error_type)
        .bind(error_message)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(self.transition_violation(id, status).await);
        }
        Ok(())
    }

    async fn find_by_id(&self, id: &TaskId) -> Result<Option<Task>> {
        let row = sqlx::query_as::<_, TaskRow>("SELECT * FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(|r| r.into_task()).transpose()
    }

    async fn list_failed(&self, filter: FailedTaskFilter) -> Result<Vec<Task>> {
        let kind = filter.kind.map(|k| k.as_str());
        let limit = filter.limit.unwrap_or(DEFAULT_LIST_LIMIT);

        let rows: Vec<TaskRow> = sqlx::query_as(
            r#"
            SELECT * FROM tasks
            WHERE status = 'FAILED'
              AND (?1 IS NULL OR kind = ?1)
              AND (?2 IS NULL OR error_message LIKE '%' || ?2 || '%')
            ORDER BY updated_at DESC
            LIMIT ?3
            "#,
        )
        .bind(kind)
        .bind(&filter.error_contains)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(|r| r.into_task()).collect()
    }

    async fn batch_retry(&self, ids: &[TaskId]) -> Result<BatchRetryOutcome> {
        let now = self.time_provider.now_millis();
        let mut outcome = BatchRetryOutcome::default();

        for id in ids {
            let result = sqlx::query(
                r#"
                UPDATE tasks
                SET status = 'PENDING', retry_count = 0, next_attempt_at = ?, updated_at = ?
                WHERE id = ? AND status = 'FAILED'
                "#,
            )
            .bind(now)
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

            if result.rows_affected() == 1 {
                outcome.success_count += 1;
            } else {
                outcome.skipped_count += 1;
            }
        }
        Ok(outcome)
    }

    async fn count_by_status(&self, kind: TaskKind, status: TaskStatus) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE kind = ? AND status = ?")
            .bind(kind.as_str())
            .bind(status.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }

    async fn requeue_processing(&self) -> Result<u64> {
        let now = self.time_provider.now_millis();
        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET status = 'PENDING', next_attempt_at = ?, updated_at = ?
            WHERE status = 'PROCESSING'
            "#,
        )
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct TaskRow {
    id: String,
    kind: String,
    payload_ref: String,
    status: String,
    priority: String,
    retry_count: i32,
    max_retries: i32,
    next_attempt_at: i64,
    error_type: Option<String>,
    error_message: Option<String>,
    created_at: i64,
    updated_at: i64,
    completed_at: Option<i64>,
}

impl TaskRow {
    fn into_task(self) -> Result<Task> {
        let kind = TaskKind::parse(&self.kind)
            .ok_or_else(|| AppError::Database(format!("Unknown task kind: {}", self.kind)))?;
        let status = TaskStatus::parse(&self.status)
            .ok_or_else(|| AppError::Database(format!("Unknown task status: {}", self.status)))?;
        let priority = TaskPriority::parse(&self.priority).ok_or_else(|| {
            AppError::Database(format!("Unknown task priority: {}", self.priority))
        })?;

        Ok(Task {
            id: self.id,
            kind,
            payload_ref: self.payload_ref,
            status,
            priority,
            retry_count: self.retry_count,
            max_retries: self.max_retries,
            next_attempt_at: self.next_attempt_at,
            error_type: self.error_type,
            error_message: self.error_message,
            created_at: self.created_at,
            updated_at: self.updated_at,
            completed_at: self.completed_at,
        })
    }
}
