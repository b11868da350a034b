// Record Lock Store Port (Interface)
//
// The Record Lock Manager exclusively owns lock state; no other component
// writes is_locked / locked_by_user_id directly.

use crate::domain::RecordLock;
use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait RecordLockStore: Send + Sync {
    /// Current lock state; None means the record has never been locked
    /// (equivalent to unlocked).
    async fn get(&self, record_id: &str) -> Result<Option<RecordLock>>;

    /// Compare-and-set: lock only if currently unlocked. Returns true if
    /// this caller won the lock.
    async fn try_lock(&self, record_id: &str, user_id: i64, now_millis: i64) -> Result<bool>;

    /// Clear the lock. With `required_holder`, the clear only applies while
    /// that user still holds the lock; None clears unconditionally
    /// (privileged path). Returns true if a locked row was cleared.
    async fn release(&self, record_id: &str, required_holder: Option<i64>) -> Result<bool>;
}

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    /// In-memory lock store for core unit tests.
    pub struct InMemoryRecordLockStore {
        locks: Mutex<HashMap<String, RecordLock>>,
    }

    impl InMemoryRecordLockStore {
        pub fn new() -> Self {
            Self {
                locks: Mutex::new(HashMap::new()),
            }
        }
    }

    impl Default for InMemoryRecordLockStore {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl RecordLockStore for InMemoryRecordLockStore {
        async fn get(&self, record_id: &str) -> Result<Option<RecordLock>> {
            Ok(self.locks.lock().await.get(record_id).cloned())
        }

        async fn try_lock(&self, record_id: &str, user_id: i64, now_millis: i64) -> Result<bool> {
            let mut locks = self.locks.lock().await;
            let entry = locks
                .entry(record_id.to_string())
                .or_insert_with(|| RecordLock::unlocked(record_id));
            if entry.is_locked {
                return Ok(false);
            }
            entry.is_locked = true;
            entry.locked_by_user_id = Some(user_id);
            entry.locked_at = Some(now_millis);
            Ok(true)
        }

        async fn release(&self, record_id: &str, required_holder: Option<i64>) -> Result<bool> {
            let mut locks = self.locks.lock().await;
            let Some(entry) = locks.get_mut(record_id) else {
                return Ok(false);
            };
            if !entry.is_locked {
                return Ok(false);
            }
            if let Some(holder) = required_holder {
                if entry.locked_by_user_id != Some(holder) {
                    return Ok(false);
                }
            }
            entry.is_locked = false;
            entry.locked_by_user_id = None;
            entry.locked_at = None;
            Ok(true)
        }
    }
}
