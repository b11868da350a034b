// Proxy Endpoint Domain Model

use serde::{Deserialize, Serialize};

/// Consecutive failures after which an endpoint is removed from rotation.
pub const DEAD_FAILURE_STREAK: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyHealth {
    Healthy,
    Suspect,
    Dead,
}

/// One egress address in the rotating pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyEndpoint {
    pub address: String,
    pub health: ProxyHealth,
    pub last_used_at: Option<i64>,
    pub failure_streak: u32,
}

impl ProxyEndpoint {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            health: ProxyHealth::Healthy,
            last_used_at: None,
            failure_streak: 0,
        }
    }

    /// A success resets the streak and restores full health.
    pub fn record_success(&mut self) {
        self.failure_streak = 0;
        self.health = ProxyHealth::Healthy;
    }

    /// A failure demotes to suspect, then to dead at the streak threshold.
    /// Dead endpoints stay dead until dropped by the next refresh cycle.
    pub fn record_failure(&mut self) {
        self.failure_streak += 1;
        self.health = if self.failure_streak >= DEAD_FAILURE_STREAK {
            ProxyHealth::Dead
        } else {
            ProxyHealth::Suspect
        };
    }

    pub fn is_usable(&self) -> bool {
        self.health != ProxyHealth::Dead
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demotes_to_suspect_then_dead() {
        let mut ep = ProxyEndpoint::new("10.0.0.1:8080");
        assert_eq!(ep.health, ProxyHealth::Healthy);

        ep.record_failure();
        assert_eq!(ep.health, ProxyHealth::Suspect);
        assert!(ep.is_usable());

        ep.record_failure();
        assert_eq!(ep.health, ProxyHealth::Suspect);

        ep.record_failure();
        assert_eq!(ep.health, ProxyHealth::Dead);
        assert!(!ep.is_usable());
    }

    #[test]
    fn success_resets_streak() {
        let mut ep = ProxyEndpoint::new("10.0.0.1:8080");
        ep.record_failure();
        ep.record_failure();
        ep.record_success();
        assert_eq!(ep.failure_streak, 0);
        assert_eq!(ep.health, ProxyHealth::Healthy);
    }

    #[test]
    fn dead_endpoint_is_not_revived_by_further_failures() {
        let mut ep = ProxyEndpoint::new("10.0.0.1:8080");
        for _ in 0..5 {
            ep.record_failure();
        }
        assert_eq!(ep.health, ProxyHealth::Dead);
    }
}
