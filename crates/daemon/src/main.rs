//! Marketcrawl daemon entry point.
//!
//! Composition root: wires the SQLite stores, the proxied fetch stack and
//! the JSON-RPC surface together, then runs one worker pool per task kind
//! until Ctrl+C.

mod config;

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use marketcrawl_api_rpc::{RpcServer, RpcServerConfig};
use marketcrawl_core::application::worker::shutdown_channel;
use marketcrawl_core::port::TaskStore;
use marketcrawl_core::application::{
    OperatorService, ProxyPoolManager, RecordLockManager, RecurringTrigger, RetryPolicy,
    TriggerConfig, WorkerPool,
};
use marketcrawl_core::domain::TaskKind;
use marketcrawl_core::port::id_provider::UuidProvider;
use marketcrawl_core::port::result_sink::LoggingResultSink;
use marketcrawl_core::port::time_provider::SystemTimeProvider;
use marketcrawl_core::port::ProxySource;
use marketcrawl_infra_fetch::{
    ClientConfig, HttpFetchExecutor, IssuingApiProxySource, ProxiedHttpClient,
    StaticListProxySource,
};
use marketcrawl_infra_sqlite::{
    create_pool, run_migrations, SqliteMonitorCatalog, SqliteRecordLockStore, SqliteTaskStore,
    SqliteTriggerState,
};

use config::{Config, ProxySourceConfig};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Logging
    let log_format =
        std::env::var("MARKETCRAWL_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("marketcrawl=info"))
        .expect("Failed to create env filter");

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }

    info!("Marketcrawl daemon v{} starting...", VERSION);

    // 2. Configuration
    let config = Config::from_env()?;

    info!(db_path = %config.db_path, "Initializing database...");

    // 3. Database
    let pool = create_pool(&config.db_path)
        .await
        .map_err(|e| anyhow::anyhow!("DB pool creation failed: {}", e))?;
    run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;

    // 4. Dependency wiring
    let time_provider = Arc::new(SystemTimeProvider);
    let id_provider = Arc::new(UuidProvider);
    let retry_policy = RetryPolicy::new(
        config.retry_backoff_base,
        config.retry_backoff_max_secs,
        config.max_retry_count,
    );
    let default_max_retries = retry_policy.default_max_retries();

    let task_store = Arc::new(SqliteTaskStore::new(
        pool.clone(),
        time_provider.clone(),
        id_provider.clone(),
        retry_policy,
    ));
    let lock_store = Arc::new(SqliteRecordLockStore::new(pool.clone()));
    let monitor_catalog = Arc::new(SqliteMonitorCatalog::new(pool.clone()));
    let trigger_state = Arc::new(SqliteTriggerState::new(pool.clone()));

    let proxy_source: Arc<dyn ProxySource> = match &config.proxy_source {
        ProxySourceConfig::StaticList(list) => {
            Arc::new(StaticListProxySource::from_comma_list(list))
        }
        ProxySourceConfig::IssuingApi { url, api_key } => Arc::new(
            IssuingApiProxySource::new(url.clone(), api_key.clone())
                .map_err(|e| anyhow::anyhow!("Proxy API client setup failed: {}", e))?,
        ),
    };
    let proxy_pool = Arc::new(ProxyPoolManager::new(proxy_source, time_provider.clone()));

    let http_client = ProxiedHttpClient::new(ClientConfig {
        timeout: Duration::from_secs(config.fetch_timeout_secs),
        delay_min_ms: config.fetch_delay_min_ms,
        delay_max_ms: config.fetch_delay_max_ms,
    });
    let fetch_executor = Arc::new(HttpFetchExecutor::new(
        http_client,
        config.target_base_url.clone(),
    ));
    let result_sink = Arc::new(LoggingResultSink);

    let operator = Arc::new(OperatorService::new(
        task_store.clone(),
        monitor_catalog.clone(),
        time_provider.clone(),
        default_max_retries,
    ));
    let lock_manager = Arc::new(RecordLockManager::new(lock_store, time_provider.clone()));

    // 5. Crash recovery: tasks left in PROCESSING by a previous run
    info!("Requeuing orphaned tasks...");
    match task_store.requeue_processing().await {
        Ok(count) => info!(requeued_tasks = count, "Crash recovery completed"),
        Err(e) => error!(error = ?e, "Crash recovery failed"),
    }

    // 6. Proxy pool: initial fill plus background refresh
    if let Err(e) = proxy_pool.refresh().await {
        warn!(error = ?e, "Initial proxy refresh failed (pool starts empty)");
    }

    let (shutdown_tx, shutdown_rx) = shutdown_channel();

    let refresh_pool = proxy_pool.clone();
    let refresh_interval = Duration::from_secs(config.proxy_refresh_secs);
    let refresh_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        refresh_pool.run(refresh_interval, refresh_shutdown).await;
    });

    // 7. JSON-RPC server
    info!("Starting JSON-RPC server...");
    let rpc_config = RpcServerConfig {
        port: config.rpc_port,
        ..Default::default()
    };
    let rpc_server = RpcServer::new(
        rpc_config,
        operator.clone(),
        lock_manager.clone(),
        proxy_pool.clone(),
    );
    let rpc_handle = rpc_server
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    // 8. Worker pools, one per task kind
    let fetch_timeout = Duration::from_secs(config.fetch_timeout_secs);
    let mut worker_handles = Vec::new();
    for kind in TaskKind::ALL {
        let size = config.pool_size(kind);
        info!(kind = %kind, size, "Starting worker pool");
        let pool = Arc::new(WorkerPool::new(
            kind,
            size,
            task_store.clone(),
            fetch_executor.clone(),
            proxy_pool.clone(),
            result_sink.clone(),
            fetch_timeout,
        ));
        worker_handles.extend(pool.spawn(&shutdown_rx));
    }

    // 9. Daily monitor trigger
    let trigger = RecurringTrigger::new(
        TriggerConfig {
            enabled: config.monitor_schedule_enabled,
            hour: config.monitor_hour,
            minute: config.monitor_minute,
            utc_offset_minutes: config.monitor_tz_offset_minutes,
        },
        task_store.clone(),
        monitor_catalog.clone(),
        trigger_state,
        time_provider.clone(),
        default_max_retries,
    );
    let trigger_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        trigger.run(trigger_shutdown).await;
    });

    info!("System ready. Waiting for tasks...");
    info!("Press Ctrl+C to shutdown");

    // 10. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received. Exiting gracefully...");

    shutdown_tx.shutdown();
    rpc_handle
        .stop()
        .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;
    for handle in worker_handles {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }

    info!("Shutdown complete.");

    Ok(())
}
