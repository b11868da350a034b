// Worker constants (no magic values in the loop body)
use std::time::Duration;

/// Sleep duration when no tasks are claimable (100ms)
pub const IDLE_SLEEP_DURATION: Duration = Duration::from_millis(100);

/// Sleep duration after a store/executor error before the loop resumes (1s)
pub const ERROR_RECOVERY_SLEEP_DURATION: Duration = Duration::from_secs(1);
