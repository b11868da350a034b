// Proxy sources
//
// Two deployments exist: a fixed operator-configured list, and a rotating
// residential pool behind an issuing API that returns the currently leased
// addresses.

use async_trait::async_trait;
use marketcrawl_core::error::{AppError, Result};
use marketcrawl_core::port::ProxySource;
use std::time::Duration;
use tracing::debug;

/// Fixed list from configuration (comma separated).
pub struct StaticListProxySource {
    addresses: Vec<String>,
}

impl StaticListProxySource {
    pub fn from_comma_list(list: &str) -> Self {
        Self {
            addresses: list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        }
    }
}

#[async_trait]
impl ProxySource for StaticListProxySource {
    async fn fetch_endpoints(&self) -> Result<Vec<String>> {
        Ok(self.addresses.clone())
    }
}

/// Issuing API: GET with optional bearer key. The API answers with one
/// ip:port per line; some deployments answer JSON instead, so both are
/// accepted.
pub struct IssuingApiProxySource {
    url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl IssuingApiProxySource {
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Config(format!("proxy api client: {e}")))?;
        Ok(Self {
            url: url.into(),
            api_key,
            client,
        })
    }
}

#[async_trait]
impl ProxySource for IssuingApiProxySource {
    async fn fetch_endpoints(&self) -> Result<Vec<String>> {
        let mut request = self.client.get(&self.url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("proxy api request: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::Internal(format!(
                "proxy api returned HTTP {}",
                response.status().as_u16()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::Internal(format!("proxy api body: {e}")))?;

        let addresses = parse_proxy_list(&body);
        debug!(count = addresses.len(), "Issuing API returned endpoints");
        Ok(addresses)
    }
}

fn parse_proxy_list(body: &str) -> Vec<String> {
    // JSON fallback: a bare array of strings, or {"proxies": [...]}
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let array = value
            .as_array()
            .cloned()
            .or_else(|| value.get("proxies").and_then(|p| p.as_array()).cloned());
        if let Some(items) = array {
            return items
                .iter()
                .filter_map(|v| v.as_str())
                .map(String::from)
                .collect();
        }
    }

    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_list_splits_and_trims() {
        let source = StaticListProxySource::from_comma_list("10.0.0.1:8080, 10.0.0.2:8080 ,,");
        let endpoints = source.fetch_endpoints().await.unwrap();
        assert_eq!(endpoints, vec!["10.0.0.1:8080", "10.0.0.2:8080"]);
    }

    #[test]
    fn parses_line_separated_response() {
        let body = "10.0.0.1:8080\n10.0.0.2:8080\n\n";
        assert_eq!(
            parse_proxy_list(body),
            vec!["10.0.0.1:8080", "10.0.0.2:8080"]
        );
    }

    #[test]
    fn parses_json_responses() {
        assert_eq!(
            parse_proxy_list(r#"["10.0.0.1:8080"]"#),
            vec!["10.0.0.1:8080"]
        );
        assert_eq!(
            parse_proxy_list(r#"{"proxies": ["10.0.0.1:8080", "10.0.0.2:8080"]}"#),
            vec!["10.0.0.1:8080", "10.0.0.2:8080"]
        );
    }
}
