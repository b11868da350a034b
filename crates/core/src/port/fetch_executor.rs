// Fetch Executor Port (Interface)
//
// The fetch-and-parse seam. Given a task and a proxy, an implementation
// returns either a structured result or a classified failure. The
// orchestrator treats it as opaque: it does not know how parsing happens,
// and it never retries here - retry decisions belong solely to the Task
// Store.

use crate::domain::{FetchError, ProxyEndpoint, Task};
use async_trait::async_trait;

#[async_trait]
pub trait FetchExecutor: Send + Sync {
    async fn execute(
        &self,
        task: &Task,
        proxy: &ProxyEndpoint,
    ) -> Result<serde_json::Value, FetchError>;
}

pub mod mocks {
    use super::*;
    use crate::domain::FetchErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted executor: fails the first `failures` calls with the given
    /// error kind, then succeeds. Counts every call.
    pub struct MockFetchExecutor {
        failures: usize,
        failure_kind: FetchErrorKind,
        calls: AtomicUsize,
    }

    impl MockFetchExecutor {
        pub fn always_succeeding() -> Self {
            Self::failing_times(0, FetchErrorKind::Network)
        }

        pub fn failing_times(failures: usize, failure_kind: FetchErrorKind) -> Self {
            Self {
                failures,
                failure_kind,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FetchExecutor for MockFetchExecutor {
        async fn execute(
            &self,
            task: &Task,
            _proxy: &ProxyEndpoint,
        ) -> Result<serde_json::Value, FetchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(FetchError::new(self.failure_kind, "scripted failure"))
            } else {
                Ok(serde_json::json!({ "payload_ref": task.payload_ref }))
            }
        }
    }
}
