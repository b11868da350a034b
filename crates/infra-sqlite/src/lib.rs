// Marketcrawl Infrastructure - SQLite Adapter
// Implements: TaskStore, RecordLockStore, MonitorCatalog, TriggerStateStore

mod connection;
mod error;
mod migration;
mod monitor_catalog;
mod record_lock_store;
mod task_store;
mod trigger_state;

pub use connection::create_pool;
pub use migration::run_migrations;
pub use monitor_catalog::SqliteMonitorCatalog;
pub use record_lock_store::SqliteRecordLockStore;
pub use task_store::SqliteTaskStore;
pub use trigger_state::SqliteTriggerState;

pub(crate) use error::map_sqlx_error;

// Note: sqlx::Error conversion is handled by the map_sqlx_error helper
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for AppError here)
