// HTTP FetchExecutor
//
// Builds the target URL for a task's kind, fetches it through the given
// proxy and hands the payload back as an opaque JSON value. Never retries:
// retry decisions belong to the task store.

use crate::client::ProxiedHttpClient;
use async_trait::async_trait;
use marketcrawl_core::domain::{FetchError, FetchErrorKind, ProxyEndpoint, Task, TaskKind};
use marketcrawl_core::port::FetchExecutor;
use url::Url;

pub struct HttpFetchExecutor {
    client: ProxiedHttpClient,
    target_base_url: String,
}

impl HttpFetchExecutor {
    pub fn new(client: ProxiedHttpClient, target_base_url: impl Into<String>) -> Self {
        let mut target_base_url = target_base_url.into();
        while target_base_url.ends_with('/') {
            target_base_url.pop();
        }
        Self {
            client,
            target_base_url,
        }
    }
}

#[async_trait]
impl FetchExecutor for HttpFetchExecutor {
    async fn execute(
        &self,
        task: &Task,
        proxy: &ProxyEndpoint,
    ) -> Result<serde_json::Value, FetchError> {
        let url = build_url(&self.target_base_url, task.kind, &task.payload_ref)?;
        let body = self.client.get(&url, proxy).await?;
        Ok(body_to_value(&body))
    }
}

/// keyword_search and listed_at_lookup hit fixed endpoints of the target;
/// product_crawl and monitor_crawl carry the full URL in payload_ref.
fn build_url(base: &str, kind: TaskKind, payload_ref: &str) -> Result<String, FetchError> {
    let malformed = |msg: String| FetchError::new(FetchErrorKind::Malformed, msg);
    match kind {
        TaskKind::KeywordSearch => {
            let url = Url::parse_with_params(&format!("{base}/search"), [("q", payload_ref)])
                .map_err(|e| malformed(format!("search url: {e}")))?;
            Ok(url.into())
        }
        TaskKind::ProductCrawl | TaskKind::MonitorCrawl => {
            let url = Url::parse(payload_ref)
                .map_err(|_| malformed(format!("payload_ref is not a URL: {payload_ref}")))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(malformed(format!("payload_ref is not a URL: {payload_ref}")));
            }
            Ok(url.into())
        }
        TaskKind::ListedAtLookup => {
            let mut url = Url::parse(base).map_err(|e| malformed(format!("base url: {e}")))?;
            url.path_segments_mut()
                .map_err(|_| malformed(format!("base url cannot take a path: {base}")))?
                .pop_if_empty()
                .push("price-history")
                .push(payload_ref);
            Ok(url.into())
        }
    }
}

/// JSON responses pass through as-is; everything else (HTML pages) is
/// wrapped so downstream parsing stays out of the orchestrator.
fn body_to_value(body: &str) -> serde_json::Value {
    serde_json::from_str(body).unwrap_or_else(|_| serde_json::json!({ "body": body }))
}
