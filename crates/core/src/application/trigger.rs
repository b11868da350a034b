// Recurring Daily Trigger
//
// Fires the monitor-crawl batch at most once per local calendar day, at or
// after the configured wall-clock time. The last-fired date is persisted,
// so a restart later the same day does not re-fire, and a daemon that was
// down over the scheduled time catches up when it comes back.

use crate::application::worker::ShutdownToken;
use crate::domain::{NewTask, TaskKind, TaskPriority};
use crate::error::Result;
use crate::port::{MonitorCatalog, TaskStore, TimeProvider, TriggerStateStore};
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, NaiveTime};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info};

pub const MONITOR_TRIGGER_NAME: &str = "monitor_daily";

const POLL_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct TriggerConfig {
    pub enabled: bool,
    /// Local wall-clock fire time.
    pub hour: u32,
    pub minute: u32,
    /// Fixed offset of the local timezone from UTC, in minutes.
    pub utc_offset_minutes: i32,
}

/// Enqueue one monitor_crawl task per monitored record. Shared by the
/// daily trigger and the manual operator path, which bypasses the schedule.
pub async fn enqueue_monitor_batch(
    task_store: &Arc<dyn TaskStore>,
    catalog: &Arc<dyn MonitorCatalog>,
    max_retries: i32,
) -> Result<u64> {
    let refs = catalog.monitored_refs().await?;
    let mut enqueued = 0u64;
    for payload_ref in refs {
        task_store
            .enqueue(NewTask {
                kind: TaskKind::MonitorCrawl,
                payload_ref,
                priority: TaskPriority::Normal,
                max_retries,
            })
            .await?;
        enqueued += 1;
    }
    Ok(enqueued)
}

pub struct RecurringTrigger {
    config: TriggerConfig,
    task_store: Arc<dyn TaskStore>,
    catalog: Arc<dyn MonitorCatalog>,
    state: Arc<dyn TriggerStateStore>,
    time_provider: Arc<dyn TimeProvider>,
    max_retries: i32,
}

impl RecurringTrigger {
    pub fn new(
        config: TriggerConfig,
        task_store: Arc<dyn TaskStore>,
        catalog: Arc<dyn MonitorCatalog>,
        state: Arc<dyn TriggerStateStore>,
        time_provider: Arc<dyn TimeProvider>,
        max_retries: i32,
    ) -> Self {
        Self {
            config,
            task_store,
            catalog,
            state,
            time_provider,
            max_retries,
        }
    }

    /// Pure schedule decision: the local calendar date to fire for, or None
    /// when the local time is before the scheduled wall-clock time or that
    /// date already fired.
    pub fn due_fire_date(
        &self,
        now_utc_millis: i64,
        last_fired: Option<NaiveDate>,
    ) -> Option<NaiveDate> {
        let utc = DateTime::from_timestamp_millis(now_utc_millis)?;
        let local = (utc + ChronoDuration::minutes(self.config.utc_offset_minutes as i64))
            .naive_utc();
        let fire_time = NaiveTime::from_hms_opt(self.config.hour, self.config.minute, 0)?;

        if local.time() < fire_time {
            return None;
        }
        let local_date = local.date();
        if last_fired == Some(local_date) {
            return None;
        }
        Some(local_date)
    }

    /// One poll step. Returns true when the batch fired.
    pub async fn tick(&self) -> Result<bool> {
        let last_fired = self.state.last_fired(MONITOR_TRIGGER_NAME).await?;
        let now = self.time_provider.now_millis();
        let Some(fire_date) = self.due_fire_date(now, last_fired) else {
            return Ok(false);
        };

        // State is advanced before enqueueing so a crash mid-batch cannot
        // double-fire the same day.
        self.state
            .set_last_fired(MONITOR_TRIGGER_NAME, fire_date)
            .await?;
        let enqueued =
            enqueue_monitor_batch(&self.task_store, &self.catalog, self.max_retries).await?;
        info!(fire_date = %fire_date, enqueued, "Daily monitor batch fired");
        Ok(true)
    }

    pub async fn run(&self, mut shutdown: ShutdownToken) {
        if !self.config.enabled {
            info!("Recurring monitor trigger disabled");
            return;
        }
        info!(
            hour = self.config.hour,
            minute = self.config.minute,
            utc_offset_minutes = self.config.utc_offset_minutes,
            "Recurring monitor trigger started"
        );
        loop {
            if shutdown.is_shutdown() {
                break;
            }
            if let Err(e) = self.tick().await {
                error!(error = %e, "Trigger tick failed");
            }
            tokio::select! {
                _ = sleep(POLL_INTERVAL) => {},
                _ = shutdown.wait() => break,
            }
        }
        info!("Recurring monitor trigger stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::retry::RetryPolicy;
    use crate::domain::TaskStatus;
    use crate::port::id_provider::mocks::SequentialIdProvider;
    use crate::port::monitor_catalog::mocks::MockMonitorCatalog;
    use crate::port::task_store::mocks::InMemoryTaskStore;
    use crate::port::time_provider::mocks::MockTimeProvider;
    use crate::port::trigger_state::mocks::InMemoryTriggerState;
    use chrono::{TimeZone, Utc};

    fn utc_millis(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> i64 {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0)
            .unwrap()
            .timestamp_millis()
    }

    fn config_2am(utc_offset_minutes: i32) -> TriggerConfig {
        TriggerConfig {
            enabled: true,
            hour: 2,
            minute: 0,
            utc_offset_minutes,
        }
    }

    struct Fixture {
        trigger: RecurringTrigger,
        store: Arc<InMemoryTaskStore>,
        state: Arc<InMemoryTriggerState>,
        time: Arc<MockTimeProvider>,
    }

    fn fixture(config: TriggerConfig, start_millis: i64) -> Fixture {
        let time = Arc::new(MockTimeProvider::new(start_millis));
        let store = Arc::new(InMemoryTaskStore::new(
            RetryPolicy::new(2, 60, 3),
            time.clone(),
            Arc::new(SequentialIdProvider::new()),
        ));
        let state = Arc::new(InMemoryTriggerState::new());
        let catalog = Arc::new(MockMonitorCatalog::new(vec![
            "https://example.com/p/1",
            "https://example.com/p/2",
        ]));
        let trigger = RecurringTrigger::new(
            config,
            store.clone() as Arc<dyn TaskStore>,
            catalog,
            state.clone() as Arc<dyn TriggerStateStore>,
            time.clone(),
            3,
        );
        Fixture {
            trigger,
            store,
            state,
            time,
        }
    }

    #[tokio::test]
    async fn does_not_fire_before_scheduled_time() {
        let f = fixture(config_2am(0), utc_millis(2026, 8, 23, 1, 59));
        assert!(!f.trigger.tick().await.unwrap());
        assert_eq!(
            f.store
                .count_by_status(TaskKind::MonitorCrawl, TaskStatus::Pending)
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn fires_once_per_day() {
        let f = fixture(config_2am(0), utc_millis(2026, 8, 23, 2, 0));
        assert!(f.trigger.tick().await.unwrap());
        assert_eq!(
            f.store
                .count_by_status(TaskKind::MonitorCrawl, TaskStatus::Pending)
                .await
                .unwrap(),
            2
        );

        // repeated polls the same day are no-ops
        f.time.advance(60 * 60 * 1_000);
        assert!(!f.trigger.tick().await.unwrap());
        assert_eq!(
            f.store
                .count_by_status(TaskKind::MonitorCrawl, TaskStatus::Pending)
                .await
                .unwrap(),
            2
        );

        // next day fires again
        f.time.set(utc_millis(2026, 8, 24, 2, 0));
        assert!(f.trigger.tick().await.unwrap());
        assert_eq!(
            f.store
                .count_by_status(TaskKind::MonitorCrawl, TaskStatus::Pending)
                .await
                .unwrap(),
            4
        );
    }

    #[tokio::test]
    async fn fires_late_when_daemon_missed_the_slot() {
        // restart at 14:30, daily 02:00 batch never ran today
        let f = fixture(config_2am(0), utc_millis(2026, 8, 23, 14, 30));
        assert!(f.trigger.tick().await.unwrap());
    }

    #[tokio::test]
    async fn persisted_state_survives_restart() {
        let f = fixture(config_2am(0), utc_millis(2026, 8, 23, 3, 0));
        assert!(f.trigger.tick().await.unwrap());

        // a fresh trigger over the same state store must not re-fire
        let catalog = Arc::new(MockMonitorCatalog::new(vec!["https://example.com/p/1"]));
        let restarted = RecurringTrigger::new(
            config_2am(0),
            f.store.clone() as Arc<dyn TaskStore>,
            catalog,
            f.state.clone() as Arc<dyn TriggerStateStore>,
            f.time.clone(),
            3,
        );
        assert!(!restarted.tick().await.unwrap());
    }

    #[tokio::test]
    async fn offset_shifts_the_local_day() {
        // 01:00 UTC is 03:00 at UTC+2, past the 02:00 slot
        let f = fixture(config_2am(120), utc_millis(2026, 8, 23, 1, 0));
        assert!(f.trigger.tick().await.unwrap());
        assert_eq!(
            f.state
                .last_fired(MONITOR_TRIGGER_NAME)
                .await
                .unwrap()
                .unwrap(),
            NaiveDate::from_ymd_opt(2026, 8, 23).unwrap()
        );

        // 23:30 UTC the same day is already 01:30 on the 24th locally,
        // before the slot, so nothing fires
        f.time.set(utc_millis(2026, 8, 23, 23, 30));
        assert!(!f.trigger.tick().await.unwrap());
    }

    #[test]
    fn due_fire_date_is_pure() {
        let f = fixture(config_2am(0), 0);
        let today = NaiveDate::from_ymd_opt(2026, 8, 23).unwrap();

        assert_eq!(
            f.trigger.due_fire_date(utc_millis(2026, 8, 23, 2, 0), None),
            Some(today)
        );
        assert_eq!(
            f.trigger.due_fire_date(utc_millis(2026, 8, 23, 2, 0), Some(today)),
            None
        );
        assert_eq!(
            f.trigger.due_fire_date(utc_millis(2026, 8, 23, 1, 59), None),
            None
        );
    }
}
