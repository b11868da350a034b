// SQLite MonitorCatalog Implementation
//
// Removal is a soft deactivate so a re-added record keeps its original
// created_at ordering.

use crate::map_sqlx_error;
use async_trait::async_trait;
use marketcrawl_core::error::Result;
use marketcrawl_core::port::MonitorCatalog;
use sqlx::SqlitePool;

pub struct SqliteMonitorCatalog {
    pool: SqlitePool,
}

impl SqliteMonitorCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MonitorCatalog for SqliteMonitorCatalog {
    async fn add(&self, payload_ref: &str, now_millis: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO monitored_records (payload_ref, active, created_at)
            VALUES (?, 1, ?)
            ON CONFLICT(payload_ref) DO UPDATE SET active = 1
            "#,
        )
        .bind(payload_ref)
        .bind(now_millis)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn remove(&self, payload_ref: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE monitored_records SET active = 0 WHERE payload_ref = ? AND active = 1",
        )
        .bind(payload_ref)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() == 1)
    }

    async fn monitored_refs(&self) -> Result<Vec<String>> {
        sqlx::query_scalar(
            "SELECT payload_ref FROM monitored_records WHERE active = 1 ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};

    async fn setup_catalog() -> SqliteMonitorCatalog {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteMonitorCatalog::new(pool)
    }

    #[tokio::test]
    async fn lists_only_active_records() {
        let catalog = setup_catalog().await;

        catalog.add("https://example.com/p/1", 1_000).await.unwrap();
        catalog.add("https://example.com/p/2", 2_000).await.unwrap();
        catalog.remove("https://example.com/p/1").await.unwrap();

        let refs = catalog.monitored_refs().await.unwrap();
        assert_eq!(refs, vec!["https://example.com/p/2".to_string()]);

        // re-adding reactivates
        catalog.add("https://example.com/p/1", 3_000).await.unwrap();
        assert_eq!(catalog.monitored_refs().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn remove_reports_whether_the_record_was_monitored() {
        let catalog = setup_catalog().await;

        catalog.add("https://example.com/p/1", 1_000).await.unwrap();
        assert!(catalog.remove("https://example.com/p/1").await.unwrap());
        // already removed, and never-added
        assert!(!catalog.remove("https://example.com/p/1").await.unwrap());
        assert!(!catalog.remove("https://example.com/p/9").await.unwrap());
    }
}
