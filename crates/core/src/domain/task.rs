// Task Domain Model

use serde::{Deserialize, Serialize};

/// Task ID (UUID v4)
pub type TaskId = String;

/// The category of remote-fetch work a task represents.
///
/// A closed set: each kind maps to exactly one worker pool and one
/// fetch strategy. Unknown kinds are a configuration error, not a
/// runtime variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    KeywordSearch,
    ProductCrawl,
    MonitorCrawl,
    ListedAtLookup,
}

impl TaskKind {
    pub const ALL: [TaskKind; 4] = [
        TaskKind::KeywordSearch,
        TaskKind::ProductCrawl,
        TaskKind::MonitorCrawl,
        TaskKind::ListedAtLookup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::KeywordSearch => "keyword_search",
            TaskKind::ProductCrawl => "product_crawl",
            TaskKind::MonitorCrawl => "monitor_crawl",
            TaskKind::ListedAtLookup => "listed_at_lookup",
        }
    }

    pub fn parse(s: &str) -> Option<TaskKind> {
        match s {
            "keyword_search" => Some(TaskKind::KeywordSearch),
            "product_crawl" => Some(TaskKind::ProductCrawl),
            "monitor_crawl" => Some(TaskKind::MonitorCrawl),
            "listed_at_lookup" => Some(TaskKind::ListedAtLookup),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task lifecycle state.
///
/// pending -> processing -> completed | failed, with failed -> pending
/// only via operator batch retry. No other transitions are valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "PENDING"),
            TaskStatus::Processing => write!(f, "PROCESSING"),
            TaskStatus::Completed => write!(f, "COMPLETED"),
            TaskStatus::Failed => write!(f, "FAILED"),
        }
    }
}

impl TaskStatus {
    pub fn parse(s: &str) -> Option<TaskStatus> {
        match s {
            "PENDING" => Some(TaskStatus::Pending),
            "PROCESSING" => Some(TaskStatus::Processing),
            "COMPLETED" => Some(TaskStatus::Completed),
            "FAILED" => Some(TaskStatus::Failed),
            _ => None,
        }
    }
}

/// Dequeue priority within a single worker pool. Never compared across kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    High,
    Normal,
    Low,
}

impl TaskPriority {
    /// Numeric dequeue rank: lower value dequeues first.
    pub fn rank(&self) -> i32 {
        match self {
            TaskPriority::High => 0,
            TaskPriority::Normal => 1,
            TaskPriority::Low => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::High => "high",
            TaskPriority::Normal => "normal",
            TaskPriority::Low => "low",
        }
    }

    pub fn parse(s: &str) -> Option<TaskPriority> {
        match s {
            "high" => Some(TaskPriority::High),
            "normal" => Some(TaskPriority::Normal),
            "low" => Some(TaskPriority::Low),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters for creating a task. The store assigns id and timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub kind: TaskKind,
    pub payload_ref: String,
    pub priority: TaskPriority,
    pub max_retries: i32,
}

/// One unit of scheduled remote-fetch work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub kind: TaskKind,
    /// Opaque reference to the input needed to execute (keyword, product
    /// URL, record id). The orchestrator never interprets its contents.
    pub payload_ref: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,

    pub retry_count: i32,
    pub max_retries: i32,
    /// Epoch ms. A pending task is eligible for claim only when
    /// now >= next_attempt_at.
    pub next_attempt_at: i64,

    pub error_type: Option<String>,
    pub error_message: Option<String>,

    pub created_at: i64, // epoch ms
    pub updated_at: i64,
    pub completed_at: Option<i64>,
}

impl Task {
    /// Create a new task in PENDING with injected id and timestamp.
    pub fn new(id: impl Into<String>, created_at: i64, spec: NewTask) -> Self {
        Self {
            id: id.into(),
            kind: spec.kind,
            payload_ref: spec.payload_ref,
            status: TaskStatus::Pending,
            priority: spec.priority,
            retry_count: 0,
            max_retries: spec.max_retries,
            next_attempt_at: created_at,
            error_type: None,
            error_message: None,
            created_at,
            updated_at: created_at,
            completed_at: None,
        }
    }

    /// Transition to PROCESSING (claim by a worker).
    pub fn claim(&mut self, now_millis: i64) -> crate::domain::error::Result<()> {
        if self.status != TaskStatus::Pending {
            return Err(crate::domain::error::DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: "PROCESSING".to_string(),
            });
        }
        self.status = TaskStatus::Processing;
        self.updated_at = now_millis;
        Ok(())
    }

    /// Transition to COMPLETED; clears error fields.
    pub fn complete(&mut self, now_millis: i64) -> crate::domain::error::Result<()> {
        if self.status != TaskStatus::Processing {
            return Err(crate::domain::error::DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: "COMPLETED".to_string(),
            });
        }
        self.status = TaskStatus::Completed;
        self.error_type = None;
        self.error_message = None;
        self.completed_at = Some(now_millis);
        self.updated_at = now_millis;
        Ok(())
    }

    /// Record a failed attempt: back to PENDING with an incremented
    /// retry_count and a deferred next_attempt_at, or terminal FAILED when
    /// the ceiling is reached. Returns true if the task will retry.
    pub fn fail(
        &mut self,
        now_millis: i64,
        next_attempt_at: i64,
        error_type: impl Into<String>,
        error_message: impl Into<String>,
    ) -> crate::domain::error::Result<bool> {
        if self.status != TaskStatus::Processing {
            return Err(crate::domain::error::DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: "FAILED".to_string(),
            });
        }
        self.error_type = Some(error_type.into());
        self.error_message = Some(error_message.into());
        self.updated_at = now_millis;

        if self.retry_count < self.max_retries {
            self.retry_count += 1;
            self.status = TaskStatus::Pending;
            self.next_attempt_at = next_attempt_at;
            Ok(true)
        } else {
            self.status = TaskStatus::Failed;
            Ok(false)
        }
    }

    /// Operator batch retry: FAILED back to PENDING with a reset counter.
    pub fn reset_for_retry(&mut self, now_millis: i64) -> crate::domain::error::Result<()> {
        if self.status != TaskStatus::Failed {
            return Err(crate::domain::error::DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: "PENDING".to_string(),
            });
        }
        self.status = TaskStatus::Pending;
        self.retry_count = 0;
        self.next_attempt_at = now_millis;
        self.updated_at = now_millis;
        Ok(())
    }
}
