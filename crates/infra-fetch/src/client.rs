// Proxied HTTP client
//
// One reqwest client is built per attempt so the proxy route is fixed for
// the attempt's lifetime and never shared across endpoints. A uniform
// random delay before each request keeps the request rate irregular.

use marketcrawl_core::domain::{FetchError, FetchErrorKind, ProxyEndpoint};
use rand::Rng;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Per-attempt request timeout.
    pub timeout: Duration,
    /// Uniform random inter-request delay bounds, in milliseconds.
    pub delay_min_ms: u64,
    pub delay_max_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            delay_min_ms: 500,
            delay_max_ms: 2_000,
        }
    }
}

pub struct ProxiedHttpClient {
    config: ClientConfig,
}

impl ProxiedHttpClient {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    /// GET the URL through the given proxy, returning the response body.
    pub async fn get(&self, url: &str, proxy: &ProxyEndpoint) -> Result<String, FetchError> {
        self.pre_request_delay().await;

        let proxy_url = normalize_proxy_url(&proxy.address);
        let reqwest_proxy = reqwest::Proxy::all(&proxy_url).map_err(|e| {
            FetchError::network(format!("invalid proxy url {}: {}", proxy_url, e))
        })?;

        let client = reqwest::Client::builder()
            .proxy(reqwest_proxy)
            .timeout(self.config.timeout)
            .user_agent(DEFAULT_USER_AGENT)
            .build()
            .map_err(|e| FetchError::network(format!("client build failed: {e}")))?;

        debug!(url, proxy = %proxy.address, "Fetching");

        let response = client.get(url).send().await.map_err(classify_reqwest_error)?;

        let status = response.status();
        if let Some(kind) = classify_status(status) {
            return Err(FetchError::new(kind, format!("HTTP {}", status.as_u16())));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::new(FetchErrorKind::Malformed, format!("body read: {e}")))?;

        if body.trim().is_empty() {
            return Err(FetchError::new(FetchErrorKind::Malformed, "empty body"));
        }
        Ok(body)
    }

    async fn pre_request_delay(&self) {
        let (min, max) = (self.config.delay_min_ms, self.config.delay_max_ms);
        if max == 0 || max < min {
            return;
        }
        let delay = rand::thread_rng().gen_range(min..=max);
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
}

/// Proxy addresses arrive as bare ip:port from the issuing API; reqwest
/// needs a scheme. Addresses that already carry one (http, socks5) pass
/// through untouched.
fn normalize_proxy_url(address: &str) -> String {
    if address.contains("://") {
        address.to_string()
    } else {
        format!("http://{address}")
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::timeout(err.to_string())
    } else if err.is_connect() {
        FetchError::network(format!("connect: {err}"))
    } else {
        FetchError::network(err.to_string())
    }
}

/// Status classification: None means success, Some(kind) a classified
/// failure. 403/429/503 are how the target signals a blocked egress IP.
fn classify_status(status: StatusCode) -> Option<FetchErrorKind> {
    match status.as_u16() {
        200..=299 => None,
        403 | 429 | 503 => Some(FetchErrorKind::Blocked),
        404 | 410 => Some(FetchErrorKind::NotFound),
        500..=599 => Some(FetchErrorKind::Network),
        _ => Some(FetchErrorKind::Malformed),
    }
}
