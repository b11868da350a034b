// SQLite TriggerStateStore Implementation
//
// Dates are stored as ISO-8601 TEXT (YYYY-MM-DD).

use crate::map_sqlx_error;
use async_trait::async_trait;
use chrono::NaiveDate;
use marketcrawl_core::error::{AppError, Result};
use marketcrawl_core::port::TriggerStateStore;
use sqlx::SqlitePool;

pub struct SqliteTriggerState {
    pool: SqlitePool,
}

impl SqliteTriggerState {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TriggerStateStore for SqliteTriggerState {
    async fn last_fired(&self, trigger_name: &str) -> Result<Option<NaiveDate>> {
        let raw: Option<String> =
            sqlx::query_scalar("SELECT last_fired_date FROM trigger_state WHERE trigger_name = ?")
                .bind(trigger_name)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        raw.map(|s| {
            NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                .map_err(|e| AppError::Database(format!("Corrupt trigger date '{}': {}", s, e)))
        })
        .transpose()
    }

    async fn set_last_fired(&self, trigger_name: &str, date: NaiveDate) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO trigger_state (trigger_name, last_fired_date)
            VALUES (?, ?)
            ON CONFLICT(trigger_name) DO UPDATE SET last_fired_date = excluded.last_fired_date
            "#,
        )
        .bind(trigger_name)
        .bind(date.format("%Y-%m-%d").to_string())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }
}
