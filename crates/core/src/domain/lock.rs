// Record Lock Domain Model

use serde::{Deserialize, Serialize};

/// Advisory single-owner lock state for a business record.
///
/// Invariant: !is_locked implies locked_by_user_id is None.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordLock {
    pub record_id: String,
    pub is_locked: bool,
    pub locked_by_user_id: Option<i64>,
    pub locked_at: Option<i64>,
}

impl RecordLock {
    pub fn unlocked(record_id: impl Into<String>) -> Self {
        Self {
            record_id: record_id.into(),
            is_locked: false,
            locked_by_user_id: None,
            locked_at: None,
        }
    }
}

/// Result of a lock attempt. First writer wins; losers are rejected
/// immediately, never queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum LockOutcome {
    Acquired,
    /// `by` is None when the holder released between the failed attempt
    /// and the state read.
    AlreadyLocked { by: Option<i64> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnlockOutcome {
    Unlocked,
    Forbidden,
}
