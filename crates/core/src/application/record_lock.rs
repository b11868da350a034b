// Record Lock Manager
//
// Advisory coordination for operator edits to monitored records. Locks
// never block crawls; they only gate operator-initiated mutations. First
// writer wins, no queueing, no expiry.

use crate::domain::{LockOutcome, RecordLock, UnlockOutcome};
use crate::error::Result;
use crate::port::{RecordLockStore, TimeProvider};
use std::sync::Arc;
use tracing::info;

pub struct RecordLockManager {
    store: Arc<dyn RecordLockStore>,
    time_provider: Arc<dyn TimeProvider>,
}

impl RecordLockManager {
    pub fn new(store: Arc<dyn RecordLockStore>, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            store,
            time_provider,
        }
    }

    /// Compare-and-set acquire. Losing callers get the current holder back
    /// so the operator UI can say who has it.
    pub async fn try_lock(&self, record_id: &str, user_id: i64) -> Result<LockOutcome> {
        let now = self.time_provider.now_millis();
        if self.store.try_lock(record_id, user_id, now).await? {
            info!(record_id, user_id, "Record locked");
            return Ok(LockOutcome::Acquired);
        }
        let holder = self
            .store
            .get(record_id)
            .await?
            .and_then(|l| l.locked_by_user_id);
        Ok(LockOutcome::AlreadyLocked { by: holder })
    }

    /// Release by the holder, or by anyone when `privileged`. Unlocking a
    /// record that is not locked is an idempotent success.
    pub async fn unlock(
        &self,
        record_id: &str,
        actor_user_id: i64,
        privileged: bool,
    ) -> Result<UnlockOutcome> {
        let current = self.store.get(record_id).await?;
        if !current.map_or(false, |l| l.is_locked) {
            return Ok(UnlockOutcome::Unlocked);
        }

        let required_holder = if privileged { None } else { Some(actor_user_id) };
        if self.store.release(record_id, required_holder).await? {
            info!(record_id, actor_user_id, privileged, "Record unlocked");
            Ok(UnlockOutcome::Unlocked)
        } else {
            Ok(UnlockOutcome::Forbidden)
        }
    }

    /// Current lock state; a record with no lock row reads as unlocked.
    pub async fn check(&self, record_id: &str) -> Result<RecordLock> {
        Ok(self
            .store
            .get(record_id)
            .await?
            .unwrap_or_else(|| RecordLock::unlocked(record_id)))
    }

    /// Whether `user_id` may mutate the record right now. Evaluated fresh
    /// before every mutation; holding a stale answer is not a permission.
    pub async fn can_mutate(&self, record_id: &str, user_id: i64, privileged: bool) -> Result<bool> {
        if privileged {
            return Ok(true);
        }
        let lock = self.check(record_id).await?;
        Ok(!lock.is_locked || lock.locked_by_user_id == Some(user_id))
    }
}
