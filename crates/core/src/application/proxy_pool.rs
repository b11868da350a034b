// Proxy Pool Manager
//
// Owns the rotating set of egress endpoints. Workers acquire an endpoint
// per attempt and report the attempt's outcome back; a background loop
// refreshes the set from the configured source. Health state is in-memory
// only: a restart starts every endpoint healthy again.

use crate::application::worker::ShutdownToken;
use crate::domain::{FetchError, ProxyEndpoint, ProxyHealth};
use crate::error::Result;
use crate::port::{ProxySource, TimeProvider};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

struct PoolInner {
    endpoints: Vec<ProxyEndpoint>,
    cursor: usize,
}

pub struct ProxyPoolManager {
    source: Arc<dyn ProxySource>,
    time_provider: Arc<dyn TimeProvider>,
    inner: Mutex<PoolInner>,
}

impl ProxyPoolManager {
    pub fn new(source: Arc<dyn ProxySource>, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            source,
            time_provider,
            inner: Mutex::new(PoolInner {
                endpoints: Vec::new(),
                cursor: 0,
            }),
        }
    }

    /// Round-robin over non-dead endpoints. Errors with NoProxyAvailable
    /// when the pool is empty or every endpoint is dead.
    pub fn acquire(&self) -> std::result::Result<ProxyEndpoint, FetchError> {
        let now = self.time_provider.now_millis();
        let mut inner = self.inner.lock().expect("proxy pool mutex poisoned");
        let len = inner.endpoints.len();
        if len == 0 {
            return Err(FetchError::no_proxy());
        }

        for step in 0..len {
            let idx = (inner.cursor + step) % len;
            if inner.endpoints[idx].is_usable() {
                inner.cursor = idx + 1;
                let endpoint = &mut inner.endpoints[idx];
                endpoint.last_used_at = Some(now);
                return Ok(endpoint.clone());
            }
        }
        Err(FetchError::no_proxy())
    }

    /// Feed an attempt's outcome back into the endpoint's health state.
    /// Unknown addresses (dropped by a refresh mid-flight) are ignored.
    pub fn report_outcome(&self, address: &str, success: bool) {
        let mut inner = self.inner.lock().expect("proxy pool mutex poisoned");
        let Some(endpoint) = inner.endpoints.iter_mut().find(|e| e.address == address) else {
            return;
        };
        if success {
            endpoint.record_success();
        } else {
            endpoint.record_failure();
            if endpoint.health == ProxyHealth::Dead {
                warn!(address = %endpoint.address, "Proxy endpoint removed from rotation");
            }
        }
    }

    /// Replace the pool from the source. Surviving addresses keep their
    /// health state, dead endpoints are dropped, and a source error leaves
    /// the last known good set in place.
    pub async fn refresh(&self) -> Result<()> {
        let addresses = match self.source.fetch_endpoints().await {
            Ok(addresses) => addresses,
            Err(e) => {
                error!(error = %e, "Proxy source refresh failed, keeping current pool");
                return Err(e);
            }
        };

        let mut inner = self.inner.lock().expect("proxy pool mutex poisoned");
        let mut surviving: HashMap<String, ProxyEndpoint> = inner
            .endpoints
            .drain(..)
            .map(|e| (e.address.clone(), e))
            .collect();

        let mut endpoints = Vec::with_capacity(addresses.len());
        for address in addresses {
            match surviving.remove(&address) {
                Some(existing) if existing.health != ProxyHealth::Dead => {
                    endpoints.push(existing)
                }
                // Dead or unseen: admit fresh. A dead endpoint re-listed by
                // the source gets a clean slate.
                _ => endpoints.push(ProxyEndpoint::new(address)),
            }
        }

        info!(pool_size = endpoints.len(), "Proxy pool refreshed");
        inner.endpoints = endpoints;
        inner.cursor = 0;
        Ok(())
    }

    /// Snapshot for operator inspection.
    pub fn status(&self) -> Vec<ProxyEndpoint> {
        self.inner
            .lock()
            .expect("proxy pool mutex poisoned")
            .endpoints
            .clone()
    }

    pub fn usable_count(&self) -> usize {
        self.inner
            .lock()
            .expect("proxy pool mutex poisoned")
            .endpoints
            .iter()
            .filter(|e| e.is_usable())
            .count()
    }

    /// Background refresh loop.
    pub async fn run(&self, interval: Duration, mut shutdown: ShutdownToken) {
        info!(interval_secs = interval.as_secs(), "Proxy refresh loop started");
        loop {
            tokio::select! {
                _ = sleep(interval) => {},
                _ = shutdown.wait() => {
                    info!("Proxy refresh loop stopped");
                    break;
                }
            }
            // Source errors were already logged; the loop keeps going.
            let _ = self.refresh().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FetchErrorKind;
    use crate::port::proxy_source::mocks::MockProxySource;
    use crate::port::time_provider::mocks::MockTimeProvider;

    fn pool_with(addresses: Vec<&str>) -> ProxyPoolManager {
        ProxyPoolManager::new(
            Arc::new(MockProxySource::fixed(addresses)),
            Arc::new(MockTimeProvider::new(1_000)),
        )
    }

    #[tokio::test]
    async fn acquire_rotates_round_robin() {
        let pool = pool_with(vec!["a:1", "b:1", "c:1"]);
        pool.refresh().await.unwrap();

        assert_eq!(pool.acquire().unwrap().address, "a:1");
        assert_eq!(pool.acquire().unwrap().address, "b:1");
        assert_eq!(pool.acquire().unwrap().address, "c:1");
        assert_eq!(pool.acquire().unwrap().address, "a:1");
    }

    #[tokio::test]
    async fn empty_pool_reports_no_proxy() {
        let pool = pool_with(vec![]);
        pool.refresh().await.unwrap();

        let err = pool.acquire().unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::NoProxyAvailable);
    }

    #[tokio::test]
    async fn dead_endpoint_is_skipped_while_others_exist() {
        let pool = pool_with(vec!["a:1", "b:1"]);
        pool.refresh().await.unwrap();

        for _ in 0..3 {
            pool.report_outcome("a:1", false);
        }

        for _ in 0..10 {
            assert_eq!(pool.acquire().unwrap().address, "b:1");
        }
    }

    #[tokio::test]
    async fn all_dead_reports_no_proxy() {
        let pool = pool_with(vec!["a:1"]);
        pool.refresh().await.unwrap();

        for _ in 0..3 {
            pool.report_outcome("a:1", false);
        }
        let err = pool.acquire().unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::NoProxyAvailable);
    }

    #[tokio::test]
    async fn success_restores_suspect_endpoint() {
        let pool = pool_with(vec!["a:1"]);
        pool.refresh().await.unwrap();

        pool.report_outcome("a:1", false);
        pool.report_outcome("a:1", false);
        pool.report_outcome("a:1", true);

        let status = pool.status();
        assert_eq!(status[0].health, ProxyHealth::Healthy);
        assert_eq!(status[0].failure_streak, 0);
    }

    #[tokio::test]
    async fn refresh_preserves_surviving_health_and_drops_dead() {
        let time = Arc::new(MockTimeProvider::new(1_000));
        let source = Arc::new(MockProxySource::new(vec![
            Ok(vec!["a:1".into(), "b:1".into(), "c:1".into()]),
            Ok(vec!["a:1".into(), "b:1".into(), "d:1".into()]),
        ]));
        let pool = ProxyPoolManager::new(source, time);

        pool.refresh().await.unwrap();
        pool.report_outcome("a:1", false); // suspect survivor
        for _ in 0..3 {
            pool.report_outcome("b:1", false); // dead, re-listed by source
        }

        pool.refresh().await.unwrap();
        let status = pool.status();
        assert_eq!(status.len(), 3);

        let a = status.iter().find(|e| e.address == "a:1").unwrap();
        assert_eq!(a.health, ProxyHealth::Suspect);
        assert_eq!(a.failure_streak, 1);

        // re-listed dead endpoint came back with a clean slate
        let b = status.iter().find(|e| e.address == "b:1").unwrap();
        assert_eq!(b.health, ProxyHealth::Healthy);

        assert!(status.iter().any(|e| e.address == "d:1"));
        assert!(!status.iter().any(|e| e.address == "c:1"));
    }

    #[tokio::test]
    async fn source_error_keeps_last_known_good_set() {
        let time = Arc::new(MockTimeProvider::new(1_000));
        let source = Arc::new(MockProxySource::new(vec![
            Ok(vec!["a:1".into()]),
            Err(crate::error::AppError::Internal(
                "issuing api unreachable".into(),
            )),
        ]));
        let pool = ProxyPoolManager::new(source, time);

        pool.refresh().await.unwrap();
        assert!(pool.refresh().await.is_err());

        assert_eq!(pool.acquire().unwrap().address, "a:1");
    }
}
