// Result Sink Port (Interface)
//
// Downstream persistence for successfully-fetched results, separate from
// the Task Store. The orchestrator only hands results over.

use crate::domain::Task;
use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn persist(&self, task: &Task, result: serde_json::Value) -> Result<()>;
}

/// Sink that only logs. Used where the real persistence layer is wired
/// elsewhere (or in tests).
pub struct LoggingResultSink;

#[async_trait]
impl ResultSink for LoggingResultSink {
    async fn persist(&self, task: &Task, result: serde_json::Value) -> Result<()> {
        tracing::info!(
            task_id = %task.id,
            kind = %task.kind,
            result_bytes = result.to_string().len(),
            "Fetch result ready for persistence"
        );
        Ok(())
    }
}
