//! JSON-RPC Server
//!
//! JSON-RPC 2.0 over TCP, bound to localhost only. Operator tooling is the
//! sole intended client; there is no external surface.

use crate::handler::RpcHandler;
use crate::types::{
    BatchRetryRequest, EnqueueTaskRequest, GetTaskRequest, ListFailedRequest, LockAcquireRequest,
    LockCheckRequest, LockReleaseRequest, MonitorAddRequest, MonitorRemoveRequest,
    ProxyStatusRequest, TriggerBatchRequest,
};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::RpcModule;
use marketcrawl_core::application::{OperatorService, ProxyPoolManager, RecordLockManager};
use std::sync::Arc;
use tracing::info;

const DEFAULT_RPC_HOST: &str = "127.0.0.1";
const DEFAULT_RPC_PORT: u16 = 9618;

/// RPC Server Configuration
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

macro_rules! register {
    ($module:expr, $handler:expr, $name:literal, $req:ty, $method:ident) => {{
        let handler = Arc::clone(&$handler);
        $module
            .register_async_method($name, move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: $req = params.parse()?;
                    handler.$method(req).await
                }
            })
            .map_err(|e| e.to_string())?;
    }};
}

impl RpcServer {
    pub fn new(
        config: RpcServerConfig,
        operator: Arc<OperatorService>,
        locks: Arc<RecordLockManager>,
        proxy_pool: Arc<ProxyPoolManager>,
    ) -> Self {
        Self {
            config,
            handler: Arc::new(RpcHandler::new(operator, locks, proxy_pool)),
        }
    }

    /// Start the JSON-RPC server.
    ///
    /// Security: only binds to 127.0.0.1 (no external access)
    pub async fn start(self) -> Result<ServerHandle, String> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        info!(
            host = %self.config.host,
            port = %self.config.port,
            "Starting JSON-RPC server on TCP (localhost only)"
        );

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| format!("Failed to build server on {}: {}", addr, e))?;

        let mut module = RpcModule::new(());

        register!(module, self.handler, "task.enqueue.v1", EnqueueTaskRequest, enqueue_task);
        register!(module, self.handler, "task.get.v1", GetTaskRequest, get_task);
        register!(module, self.handler, "task.listFailed.v1", ListFailedRequest, list_failed);
        register!(module, self.handler, "task.batchRetry.v1", BatchRetryRequest, batch_retry);
        register!(module, self.handler, "monitor.add.v1", MonitorAddRequest, monitor_add);
        register!(
            module,
            self.handler,
            "monitor.remove.v1",
            MonitorRemoveRequest,
            monitor_remove
        );
        register!(
            module,
            self.handler,
            "monitor.triggerBatch.v1",
            TriggerBatchRequest,
            trigger_monitor_batch
        );
        register!(module, self.handler, "lock.acquire.v1", LockAcquireRequest, lock_acquire);
        register!(module, self.handler, "lock.release.v1", LockReleaseRequest, lock_release);
        register!(module, self.handler, "lock.check.v1", LockCheckRequest, lock_check);
        register!(module, self.handler, "proxy.status.v1", ProxyStatusRequest, proxy_status);

        info!("JSON-RPC server started successfully");

        let handle = server.start(module);
        Ok(handle)
    }
}
