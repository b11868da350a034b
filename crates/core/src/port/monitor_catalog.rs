// Monitor Catalog Port (Interface)

use crate::error::Result;
use async_trait::async_trait;

/// The set of records under daily monitoring. Operators manage membership
/// through `add`/`remove`; the recurring trigger and the manual
/// monitor-batch path enumerate it via `monitored_refs`.
#[async_trait]
pub trait MonitorCatalog: Send + Sync {
    /// Put a record under monitoring. Re-adding a removed record
    /// reactivates it; adding an existing one is a no-op.
    async fn add(&self, payload_ref: &str, now_millis: i64) -> Result<()>;

    /// Take a record out of monitoring. Returns false if it was not
    /// monitored.
    async fn remove(&self, payload_ref: &str) -> Result<bool>;

    async fn monitored_refs(&self) -> Result<Vec<String>>;
}

pub mod mocks {
    use super::*;
    use tokio::sync::Mutex;

    pub struct MockMonitorCatalog {
        refs: Mutex<Vec<String>>,
    }

    impl MockMonitorCatalog {
        pub fn new(refs: Vec<&str>) -> Self {
            Self {
                refs: Mutex::new(refs.into_iter().map(String::from).collect()),
            }
        }
    }

    #[async_trait]
    impl MonitorCatalog for MockMonitorCatalog {
        async fn add(&self, payload_ref: &str, _now_millis: i64) -> Result<()> {
            let mut refs = self.refs.lock().await;
            if !refs.iter().any(|r| r == payload_ref) {
                refs.push(payload_ref.to_string());
            }
            Ok(())
        }

        async fn remove(&self, payload_ref: &str) -> Result<bool> {
            let mut refs = self.refs.lock().await;
            let before = refs.len();
            refs.retain(|r| r != payload_ref);
            Ok(refs.len() < before)
        }

        async fn monitored_refs(&self) -> Result<Vec<String>> {
            Ok(self.refs.lock().await.clone())
        }
    }
}
