// Fetch Error Classification

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classified outcome of a failed fetch attempt.
///
/// Transient (timeout, network) and target-classified (blocked, not_found)
/// failures are retried identically; distinguishing a permanent target block
/// from a transient one is not assumed possible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    Timeout,
    Blocked,
    NotFound,
    Malformed,
    Network,
    NoProxyAvailable,
}

impl FetchErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchErrorKind::Timeout => "timeout",
            FetchErrorKind::Blocked => "blocked",
            FetchErrorKind::NotFound => "not_found",
            FetchErrorKind::Malformed => "malformed",
            FetchErrorKind::Network => "network",
            FetchErrorKind::NoProxyAvailable => "no_proxy_available",
        }
    }

    /// Whether the failure counts against the proxy endpoint's streak.
    /// not_found/malformed mean the proxy delivered a response.
    pub fn is_proxy_fault(&self) -> bool {
        matches!(
            self,
            FetchErrorKind::Timeout | FetchErrorKind::Network | FetchErrorKind::Blocked
        )
    }
}

impl std::fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Timeout, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Network, message)
    }

    pub fn no_proxy() -> Self {
        Self::new(FetchErrorKind::NoProxyAvailable, "proxy pool is empty")
    }
}
