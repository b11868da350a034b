//! RPC Method Handlers
//!
//! Implements the business logic for each JSON-RPC method.

use crate::error::{throttled, to_rpc_error};
use crate::rate_limiter::RateLimiter;
use crate::types::*;
use jsonrpsee::types::ErrorObjectOwned;
use marketcrawl_core::application::{OperatorService, ProxyPoolManager, RecordLockManager};
use marketcrawl_core::domain::{LockOutcome, TaskKind, TaskPriority, TaskStatus, UnlockOutcome};
use marketcrawl_core::error::AppError;
use marketcrawl_core::port::FailedTaskFilter;
use std::sync::Arc;

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    operator: Arc<OperatorService>,
    locks: Arc<RecordLockManager>,
    proxy_pool: Arc<ProxyPoolManager>,
    rate_limiter: RateLimiter,
}

impl RpcHandler {
    pub fn new(
        operator: Arc<OperatorService>,
        locks: Arc<RecordLockManager>,
        proxy_pool: Arc<ProxyPoolManager>,
    ) -> Self {
        // Default: 200 burst, 100 req/sec (configurable via env)
        let max_burst: u32 = std::env::var("MARKETCRAWL_RATE_LIMIT_BURST")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(200);

        let rate_per_sec: u32 = std::env::var("MARKETCRAWL_RATE_LIMIT_RATE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(100);

        Self {
            operator,
            locks,
            proxy_pool,
            rate_limiter: RateLimiter::new(max_burst, rate_per_sec),
        }
    }

    fn check_rate_limit(&self) -> Result<(), ErrorObjectOwned> {
        if self.rate_limiter.try_acquire() {
            Ok(())
        } else {
            Err(throttled())
        }
    }

    /// task.enqueue.v1
    pub async fn enqueue_task(
        &self,
        params: EnqueueTaskRequest,
    ) -> Result<EnqueueTaskResponse, ErrorObjectOwned> {
        self.check_rate_limit()?;

        let kind = TaskKind::parse(&params.kind).ok_or_else(|| {
            to_rpc_error(AppError::Validation(format!(
                "Unknown task kind: {}",
                params.kind
            )))
        })?;
        let priority = match params.priority.as_deref() {
            None => TaskPriority::Normal,
            Some(raw) => TaskPriority::parse(raw).ok_or_else(|| {
                to_rpc_error(AppError::Validation(format!("Unknown priority: {raw}")))
            })?,
        };

        let task_id = self
            .operator
            .enqueue(kind, params.payload_ref, priority)
            .await
            .map_err(to_rpc_error)?;

        Ok(EnqueueTaskResponse {
            task_id,
            status: TaskStatus::Pending.to_string(),
            kind: kind.as_str().to_string(),
        })
    }

    /// task.get.v1
    pub async fn get_task(&self, params: GetTaskRequest) -> Result<TaskView, ErrorObjectOwned> {
        self.check_rate_limit()?;
        let task = self
            .operator
            .get_task(&params.task_id)
            .await
            .map_err(to_rpc_error)?;
        Ok(task.into())
    }

    /// task.listFailed.v1
    pub async fn list_failed(
        &self,
        params: ListFailedRequest,
    ) -> Result<ListFailedResponse, ErrorObjectOwned> {
        self.check_rate_limit()?;

        let kind = params
            .kind
            .as_deref()
            .map(|raw| {
                TaskKind::parse(raw).ok_or_else(|| {
                    to_rpc_error(AppError::Validation(format!("Unknown task kind: {raw}")))
                })
            })
            .transpose()?;

        let tasks = self
            .operator
            .list_failed(FailedTaskFilter {
                kind,
                error_contains: params.error_contains,
                limit: params.limit,
            })
            .await
            .map_err(to_rpc_error)?;

        Ok(ListFailedResponse {
            tasks: tasks.into_iter().map(TaskView::from).collect(),
        })
    }

    /// task.batchRetry.v1
    pub async fn batch_retry(
        &self,
        params: BatchRetryRequest,
    ) -> Result<BatchRetryResponse, ErrorObjectOwned> {
        self.check_rate_limit()?;
        let outcome = self
            .operator
            .batch_retry(&params.task_ids)
            .await
            .map_err(to_rpc_error)?;
        Ok(BatchRetryResponse {
            success_count: outcome.success_count,
            skipped_count: outcome.skipped_count,
        })
    }

    /// monitor.triggerBatch.v1
    pub async fn trigger_monitor_batch(
        &self,
        _params: TriggerBatchRequest,
    ) -> Result<TriggerBatchResponse, ErrorObjectOwned> {
        self.check_rate_limit()?;
        let enqueued = self
            .operator
            .trigger_monitor_batch()
            .await
            .map_err(to_rpc_error)?;
        Ok(TriggerBatchResponse { enqueued })
    }

    /// monitor.add.v1
    pub async fn monitor_add(
        &self,
        params: MonitorAddRequest,
    ) -> Result<MonitorAddResponse, ErrorObjectOwned> {
        self.check_rate_limit()?;
        self.operator
            .add_monitored(params.payload_ref)
            .await
            .map_err(to_rpc_error)?;
        Ok(MonitorAddResponse { added: true })
    }

    /// monitor.remove.v1
    pub async fn monitor_remove(
        &self,
        params: MonitorRemoveRequest,
    ) -> Result<MonitorRemoveResponse, ErrorObjectOwned> {
        self.check_rate_limit()?;
        let removed = self
            .operator
            .remove_monitored(&params.payload_ref)
            .await
            .map_err(to_rpc_error)?;
        Ok(MonitorRemoveResponse { removed })
    }

    /// lock.acquire.v1
    pub async fn lock_acquire(
        &self,
        params: LockAcquireRequest,
    ) -> Result<LockAcquireResponse, ErrorObjectOwned> {
        self.check_rate_limit()?;
        let outcome = self
            .locks
            .try_lock(&params.record_id, params.user_id)
            .await
            .map_err(to_rpc_error)?;

        Ok(match outcome {
            LockOutcome::Acquired => LockAcquireResponse {
                acquired: true,
                locked_by: Some(params.user_id),
            },
            LockOutcome::AlreadyLocked { by } => LockAcquireResponse {
                acquired: false,
                locked_by: by,
            },
        })
    }

    /// lock.release.v1
    pub async fn lock_release(
        &self,
        params: LockReleaseRequest,
    ) -> Result<LockReleaseResponse, ErrorObjectOwned> {
        self.check_rate_limit()?;
        let outcome = self
            .locks
            .unlock(&params.record_id, params.user_id, params.privileged)
            .await
            .map_err(to_rpc_error)?;

        Ok(LockReleaseResponse {
            released: outcome == UnlockOutcome::Unlocked,
        })
    }

    /// lock.check.v1
    pub async fn lock_check(
        &self,
        params: LockCheckRequest,
    ) -> Result<LockCheckResponse, ErrorObjectOwned> {
        self.check_rate_limit()?;
        let lock = self
            .locks
            .check(&params.record_id)
            .await
            .map_err(to_rpc_error)?;
        Ok(lock.into())
    }

    /// proxy.status.v1
    pub async fn proxy_status(
        &self,
        _params: ProxyStatusRequest,
    ) -> Result<ProxyStatusResponse, ErrorObjectOwned> {
        self.check_rate_limit()?;
        let endpoints = self.proxy_pool.status();
        let usable = endpoints.iter().filter(|e| e.is_usable()).count();
        Ok(ProxyStatusResponse {
            total: endpoints.len(),
            usable,
            endpoints: endpoints.into_iter().map(ProxyEndpointView::from).collect(),
        })
    }
}
