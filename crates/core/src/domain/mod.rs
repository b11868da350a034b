// Domain Layer - entities and pure logic

pub mod error;
pub mod fetch;
pub mod lock;
pub mod profit;
pub mod proxy;
pub mod task;

pub use error::DomainError;
pub use fetch::{FetchError, FetchErrorKind};
pub use lock::{LockOutcome, RecordLock, UnlockOutcome};
pub use profit::{calculate_profit, ProfitBreakdown, ProfitInputs};
pub use proxy::{ProxyEndpoint, ProxyHealth, DEAD_FAILURE_STREAK};
pub use task::{NewTask, Task, TaskId, TaskKind, TaskPriority, TaskStatus};
