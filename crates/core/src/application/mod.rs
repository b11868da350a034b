// Application Layer - orchestration services built on the ports

pub mod operator;
pub mod proxy_pool;
pub mod record_lock;
pub mod retry;
pub mod trigger;
pub mod worker;

pub use operator::OperatorService;
pub use proxy_pool::ProxyPoolManager;
pub use record_lock::RecordLockManager;
pub use retry::{RetryDecision, RetryPolicy};
pub use trigger::{RecurringTrigger, TriggerConfig};
pub use worker::WorkerPool;
