// Marketcrawl Infrastructure - HTTP Fetch Adapter
// Implements: FetchExecutor, ProxySource

mod client;
mod executor;
mod proxy_source;

pub use client::{ClientConfig, ProxiedHttpClient};
pub use executor::HttpFetchExecutor;
pub use proxy_source::{IssuingApiProxySource, StaticListProxySource};
