// SQLite RecordLockStore Implementation
//
// The CAS is a conditional UPDATE on is_locked = 0, so two concurrent
// lockers can never both win: SQLite serializes the writes and the loser's
// UPDATE touches zero rows.

use crate::map_sqlx_error;
use async_trait::async_trait;
use marketcrawl_core::domain::RecordLock;
use marketcrawl_core::error::Result;
use marketcrawl_core::port::RecordLockStore;
use sqlx::SqlitePool;

pub struct SqliteRecordLockStore {
    pool: SqlitePool,
}

impl SqliteRecordLockStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordLockStore for SqliteRecordLockStore {
    async fn get(&self, record_id: &str) -> Result<Option<RecordLock>> {
        let row = sqlx::query_as::<_, LockRow>(
            "SELECT record_id, is_locked, locked_by_user_id, locked_at FROM record_locks WHERE record_id = ?",
        )
        .bind(record_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(LockRow::into_lock))
    }

    async fn try_lock(&self, record_id: &str, user_id: i64, now_millis: i64) -> Result<bool> {
        // Ensure the row exists so the CAS below is a plain UPDATE.
        sqlx::query("INSERT OR IGNORE INTO record_locks (record_id, is_locked) VALUES (?, 0)")
            .bind(record_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let result = sqlx::query(
            r#"
            UPDATE record_locks
            SET is_locked = 1, locked_by_user_id = ?, locked_at = ?
            WHERE record_id = ? AND is_locked = 0
            "#,
        )
        .bind(user_id)
        .bind(now_millis)
        .bind(record_id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn release(&self, record_id: &str, required_holder: Option<i64>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE record_locks
            SET is_locked = 0, locked_by_user_id = NULL, locked_at = NULL
            WHERE record_id = ? AND is_locked = 1
              AND (?2 IS NULL OR locked_by_user_id = ?2)
            "#,
        )
        .bind(record_id)
        .bind(required_holder)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LockRow {
    record_id: String,
    is_locked: i32,
    locked_by_user_id: Option<i64>,
    locked_at: Option<i64>,
}

impl LockRow {
    fn into_lock(self) -> RecordLock {
        RecordLock {
            record_id: self.record_id,
            is_locked: self.is_locked != 0,
            locked_by_user_id: self.locked_by_user_id,
            locked_at: self.locked_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};

    async fn setup_store() -> SqliteRecordLockStore {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteRecordLockStore::new(pool)
    }

    #[tokio::test]
    async fn cas_lets_exactly_one_locker_win() {
        let store = setup_store().await;

        assert!(store.try_lock("rec-1", 10, 1_000).await.unwrap());
        assert!(!store.try_lock("rec-1", 11, 1_001).await.unwrap());

        let lock = store.get("rec-1").await.unwrap().unwrap();
        assert!(lock.is_locked);
        assert_eq!(lock.locked_by_user_id, Some(10));
        assert_eq!(lock.locked_at, Some(1_000));
    }

    #[tokio::test]
    async fn release_requires_holder_unless_unconditional() {
        let store = setup_store().await;
        store.try_lock("rec-1", 10, 1_000).await.unwrap();

        // wrong holder fails
        assert!(!store.release("rec-1", Some(11)).await.unwrap());
        // holder succeeds
        assert!(store.release("rec-1", Some(10)).await.unwrap());

        let lock = store.get("rec-1").await.unwrap().unwrap();
        assert!(!lock.is_locked);
        assert!(lock.locked_by_user_id.is_none());

        // releasing an unlocked row touches nothing
        assert!(!store.release("rec-1", None).await.unwrap());
    }

    #[tokio::test]
    async fn unconditional_release_ignores_holder() {
        let store = setup_store().await;
        store.try_lock("rec-1", 10, 1_000).await.unwrap();
        assert!(store.release("rec-1", None).await.unwrap());
    }

    #[tokio::test]
    async fn never_locked_record_reads_as_absent() {
        let store = setup_store().await;
        assert!(store.get("rec-unknown").await.unwrap().is_none());
    }
}
