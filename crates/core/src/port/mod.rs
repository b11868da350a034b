// Port Layer - Interfaces for external dependencies

pub mod fetch_executor;
pub mod id_provider;
pub mod monitor_catalog;
pub mod proxy_source;
pub mod record_lock_store;
pub mod result_sink;
pub mod task_store;
pub mod time_provider;
pub mod trigger_state;

// Re-exports
pub use fetch_executor::FetchExecutor;
pub use id_provider::IdProvider;
pub use monitor_catalog::MonitorCatalog;
pub use proxy_source::ProxySource;
pub use record_lock_store::RecordLockStore;
pub use result_sink::ResultSink;
pub use task_store::{BatchRetryOutcome, FailedTaskFilter, TaskStore};
pub use time_provider::TimeProvider;
pub use trigger_state::TriggerStateStore;
