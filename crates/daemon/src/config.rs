//! Daemon configuration from environment variables (MARKETCRAWL_ prefix).

use anyhow::{anyhow, bail, Result};
use marketcrawl_core::domain::TaskKind;

const DEFAULT_DB_PATH: &str = "~/.marketcrawl/marketcrawl.db";
const DEFAULT_RPC_PORT: u16 = 9618;

const DEFAULT_MAX_RETRY_COUNT: i32 = 3;
const DEFAULT_RETRY_BACKOFF_BASE: u32 = 2;
const DEFAULT_RETRY_BACKOFF_MAX_SECS: u64 = 60;

const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;
const DEFAULT_FETCH_DELAY_MIN_MS: u64 = 500;
const DEFAULT_FETCH_DELAY_MAX_MS: u64 = 2_000;

const DEFAULT_PROXY_REFRESH_SECS: u64 = 120;

const DEFAULT_MONITOR_HOUR: u32 = 2;
const DEFAULT_MONITOR_MINUTE: u32 = 0;

/// Where the rotating pool gets its addresses.
#[derive(Debug, Clone)]
pub enum ProxySourceConfig {
    /// Comma-separated list from MARKETCRAWL_PROXY_LIST.
    StaticList(String),
    /// Issuing API from MARKETCRAWL_PROXY_API_URL (+ optional key).
    IssuingApi { url: String, api_key: Option<String> },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub rpc_port: u16,

    pub pool_keyword_search: usize,
    pub pool_product_crawl: usize,
    pub pool_monitor_crawl: usize,
    pub pool_listed_at_lookup: usize,

    pub max_retry_count: i32,
    pub retry_backoff_base: u32,
    pub retry_backoff_max_secs: u64,

    pub fetch_timeout_secs: u64,
    pub fetch_delay_min_ms: u64,
    pub fetch_delay_max_ms: u64,
    pub target_base_url: String,

    pub proxy_source: ProxySourceConfig,
    pub proxy_refresh_secs: u64,

    pub monitor_schedule_enabled: bool,
    pub monitor_hour: u32,
    pub monitor_minute: u32,
    pub monitor_tz_offset_minutes: i32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Parse from an arbitrary key lookup (env in production, a map in
    /// tests).
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let config = Self {
            db_path: get("MARKETCRAWL_DB_PATH")
                .unwrap_or_else(|| shellexpand::tilde(DEFAULT_DB_PATH).into_owned()),
            rpc_port: parse_or(&get, "MARKETCRAWL_RPC_PORT", DEFAULT_RPC_PORT)?,

            pool_keyword_search: parse_or(&get, "MARKETCRAWL_POOL_KEYWORD_SEARCH", 2)?,
            pool_product_crawl: parse_or(&get, "MARKETCRAWL_POOL_PRODUCT_CRAWL", 4)?,
            pool_monitor_crawl: parse_or(&get, "MARKETCRAWL_POOL_MONITOR_CRAWL", 2)?,
            pool_listed_at_lookup: parse_or(&get, "MARKETCRAWL_POOL_LISTED_AT_LOOKUP", 1)?,

            max_retry_count: parse_or(&get, "MARKETCRAWL_MAX_RETRY_COUNT", DEFAULT_MAX_RETRY_COUNT)?,
            retry_backoff_base: parse_or(
                &get,
                "MARKETCRAWL_RETRY_BACKOFF_BASE",
                DEFAULT_RETRY_BACKOFF_BASE,
            )?,
            retry_backoff_max_secs: parse_or(
                &get,
                "MARKETCRAWL_RETRY_BACKOFF_MAX",
                DEFAULT_RETRY_BACKOFF_MAX_SECS,
            )?,

            fetch_timeout_secs: parse_or(
                &get,
                "MARKETCRAWL_FETCH_TIMEOUT_SECS",
                DEFAULT_FETCH_TIMEOUT_SECS,
            )?,
            fetch_delay_min_ms: parse_or(
                &get,
                "MARKETCRAWL_FETCH_DELAY_MIN_MS",
                DEFAULT_FETCH_DELAY_MIN_MS,
            )?,
            fetch_delay_max_ms: parse_or(
                &get,
                "MARKETCRAWL_FETCH_DELAY_MAX_MS",
                DEFAULT_FETCH_DELAY_MAX_MS,
            )?,
            target_base_url: get("MARKETCRAWL_TARGET_BASE_URL")
                .ok_or_else(|| anyhow!("MARKETCRAWL_TARGET_BASE_URL must be set"))?,

            proxy_source: match (
                get("MARKETCRAWL_PROXY_LIST"),
                get("MARKETCRAWL_PROXY_API_URL"),
            ) {
                (Some(list), None) => ProxySourceConfig::StaticList(list),
                (None, Some(url)) => ProxySourceConfig::IssuingApi {
                    url,
                    api_key: get("MARKETCRAWL_PROXY_API_KEY"),
                },
                (Some(_), Some(_)) => {
                    bail!("Set MARKETCRAWL_PROXY_LIST or MARKETCRAWL_PROXY_API_URL, not both")
                }
                (None, None) => {
                    bail!("One of MARKETCRAWL_PROXY_LIST or MARKETCRAWL_PROXY_API_URL must be set")
                }
            },
            proxy_refresh_secs: parse_or(
                &get,
                "MARKETCRAWL_PROXY_REFRESH_SECS",
                DEFAULT_PROXY_REFRESH_SECS,
            )?,

            monitor_schedule_enabled: parse_or(&get, "MARKETCRAWL_MONITOR_SCHEDULE_ENABLED", true)?,
            monitor_hour: parse_or(&get, "MARKETCRAWL_MONITOR_HOUR", DEFAULT_MONITOR_HOUR)?,
            monitor_minute: parse_or(&get, "MARKETCRAWL_MONITOR_MINUTE", DEFAULT_MONITOR_MINUTE)?,
            monitor_tz_offset_minutes: parse_or(&get, "MARKETCRAWL_MONITOR_TZ_OFFSET_MINUTES", 0)?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for kind in TaskKind::ALL {
            if self.pool_size(kind) == 0 {
                bail!("Worker pool size for {} must be at least 1", kind);
            }
        }
        if self.max_retry_count < 0 {
            bail!("MARKETCRAWL_MAX_RETRY_COUNT must be >= 0");
        }
        if self.retry_backoff_base < 1 {
            bail!("MARKETCRAWL_RETRY_BACKOFF_BASE must be >= 1");
        }
        if self.fetch_delay_min_ms > self.fetch_delay_max_ms {
            bail!("MARKETCRAWL_FETCH_DELAY_MIN_MS must not exceed MARKETCRAWL_FETCH_DELAY_MAX_MS");
        }
        if self.monitor_hour > 23 || self.monitor_minute > 59 {
            bail!("Monitor schedule time must be a valid wall-clock time");
        }
        Ok(())
    }

    pub fn pool_size(&self, kind: TaskKind) -> usize {
        match kind {
            TaskKind::KeywordSearch => self.pool_keyword_search,
            TaskKind::ProductCrawl => self.pool_product_crawl,
            TaskKind::MonitorCrawl => self.pool_monitor_crawl,
            TaskKind::ListedAtLookup => self.pool_listed_at_lookup,
        }
    }
}

fn parse_or<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T> {
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| anyhow!("{} has an invalid value: {}", key, raw)),
    }
}
