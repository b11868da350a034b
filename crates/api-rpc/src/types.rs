//! RPC Request/Response Types
//!
//! Defines the JSON-RPC method parameters and results.

use marketcrawl_core::domain::{ProxyEndpoint, RecordLock, Task};
use serde::{Deserialize, Serialize};

/// task.enqueue.v1 - Enqueue a task
#[derive(Debug, Deserialize)]
pub struct EnqueueTaskRequest {
    pub kind: String,
    pub payload_ref: String,
    /// "high" | "normal" | "low", defaults to normal.
    #[serde(default)]
    pub priority: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnqueueTaskResponse {
    pub task_id: String,
    pub status: String,
    pub kind: String,
}

/// task.get.v1 - Fetch one task by id
#[derive(Debug, Deserialize)]
pub struct GetTaskRequest {
    pub task_id: String,
}

/// Wire representation of a task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskView {
    pub task_id: String,
    pub kind: String,
    pub payload_ref: String,
    pub status: String,
    pub priority: String,
    pub retry_count: i32,
    pub max_retries: i32,
    pub next_attempt_at: i64,
    pub error_type: Option<String>,
    pub error_message: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub completed_at: Option<i64>,
}

impl From<Task> for TaskView {
    fn from(task: Task) -> Self {
        Self {
            task_id: task.id,
            kind: task.kind.as_str().to_string(),
            payload_ref: task.payload_ref,
            status: task.status.to_string(),
            priority: task.priority.as_str().to_string(),
            retry_count: task.retry_count,
            max_retries: task.max_retries,
            next_attempt_at: task.next_attempt_at,
            error_type: task.error_type,
            error_message: task.error_message,
            created_at: task.created_at,
            updated_at: task.updated_at,
            completed_at: task.completed_at,
        }
    }
}

/// task.listFailed.v1 - Inspect failed tasks
#[derive(Debug, Deserialize)]
pub struct ListFailedRequest {
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub error_contains: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListFailedResponse {
    pub tasks: Vec<TaskView>,
}

/// task.batchRetry.v1 - Reset failed tasks for a fresh retry budget
#[derive(Debug, Deserialize)]
pub struct BatchRetryRequest {
    pub task_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchRetryResponse {
    pub success_count: u64,
    pub skipped_count: u64,
}

/// monitor.add.v1 - Put a record under daily monitoring
#[derive(Debug, Deserialize)]
pub struct MonitorAddRequest {
    pub payload_ref: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitorAddResponse {
    pub added: bool,
}

/// monitor.remove.v1 - Take a record out of daily monitoring
#[derive(Debug, Deserialize)]
pub struct MonitorRemoveRequest {
    pub payload_ref: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitorRemoveResponse {
    pub removed: bool,
}

/// monitor.triggerBatch.v1 - Manual monitor batch (bypasses the schedule)
#[derive(Debug, Deserialize)]
pub struct TriggerBatchRequest {
    // No parameters needed
}

#[derive(Debug, Clone, Serialize)]
pub struct TriggerBatchResponse {
    pub enqueued: u64,
}

/// lock.acquire.v1
#[derive(Debug, Deserialize)]
pub struct LockAcquireRequest {
    pub record_id: String,
    pub user_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LockAcquireResponse {
    pub acquired: bool,
    pub locked_by: Option<i64>,
}

/// lock.release.v1
#[derive(Debug, Deserialize)]
pub struct LockReleaseRequest {
    pub record_id: String,
    pub user_id: i64,
    #[serde(default)]
    pub privileged: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LockReleaseResponse {
    pub released: bool,
}

/// lock.check.v1
#[derive(Debug, Deserialize)]
pub struct LockCheckRequest {
    pub record_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LockCheckResponse {
    pub record_id: String,
    pub is_locked: bool,
    pub locked_by_user_id: Option<i64>,
    pub locked_at: Option<i64>,
}

impl From<RecordLock> for LockCheckResponse {
    fn from(lock: RecordLock) -> Self {
        Self {
            record_id: lock.record_id,
            is_locked: lock.is_locked,
            locked_by_user_id: lock.locked_by_user_id,
            locked_at: lock.locked_at,
        }
    }
}

/// proxy.status.v1 - Inspect the rotating pool
#[derive(Debug, Deserialize)]
pub struct ProxyStatusRequest {
    // No parameters needed
}

#[derive(Debug, Clone, Serialize)]
pub struct ProxyEndpointView {
    pub address: String,
    pub health: String,
    pub failure_streak: u32,
    pub last_used_at: Option<i64>,
}

impl From<ProxyEndpoint> for ProxyEndpointView {
    fn from(ep: ProxyEndpoint) -> Self {
        use marketcrawl_core::domain::ProxyHealth;
        let health = match ep.health {
            ProxyHealth::Healthy => "healthy",
            ProxyHealth::Suspect => "suspect",
            ProxyHealth::Dead => "dead",
        };
        Self {
            address: ep.address,
            health: health.to_string(),
            failure_streak: ep.failure_streak,
            last_used_at: ep.last_used_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProxyStatusResponse {
    pub total: usize,
    pub usable: usize,
    pub endpoints: Vec<ProxyEndpointView>,
}
