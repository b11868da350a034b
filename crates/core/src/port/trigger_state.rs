// Trigger State Port (Interface)
//
// Persists the last-fired calendar date per trigger so a restart cannot
// double-fire the same day.

use crate::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

#[async_trait]
pub trait TriggerStateStore: Send + Sync {
    async fn last_fired(&self, trigger_name: &str) -> Result<Option<NaiveDate>>;

    async fn set_last_fired(&self, trigger_name: &str, date: NaiveDate) -> Result<()>;
}

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    pub struct InMemoryTriggerState {
        fired: Mutex<HashMap<String, NaiveDate>>,
    }

    impl InMemoryTriggerState {
        pub fn new() -> Self {
            Self {
                fired: Mutex::new(HashMap::new()),
            }
        }
    }

    impl Default for InMemoryTriggerState {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl TriggerStateStore for InMemoryTriggerState {
        async fn last_fired(&self, trigger_name: &str) -> Result<Option<NaiveDate>> {
            Ok(self.fired.lock().await.get(trigger_name).copied())
        }

        async fn set_last_fired(&self, trigger_name: &str, date: NaiveDate) -> Result<()> {
            self.fired.lock().await.insert(trigger_name.to_string(), date);
            Ok(())
        }
    }
}
