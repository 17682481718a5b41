//! 网关装配与启停顺序
//!
//! 启动：变量存储（协议汇） → UDP 接收器 → 日志转发器，任一步失败则回滚已启动的组件。
//! 停止：UDP 接收器（等待在途数据报） → 日志转发器 → 变量存储 → 配置任务。

use domain::Lifecycle;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tgw_config::GatewayConfig;
use tgw_ingest::{IngestError, UdpIngestor, UdpIngestorConfig};
use tgw_logsink::{ForwarderError, LogForwarder, LogForwarderConfig, RetryPolicy, SinkEndpoint};
use tgw_protocol::{
    ProtocolError, ProtocolSink, ProtocolSinkConfig, VariableStore, VariableStoreConfig,
};
use tgw_router::{ConfigTask, Router};
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway already running")]
    AlreadyRunning,
    #[error("gateway has been stopped and cannot be restarted")]
    Terminated,
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Forwarder(#[from] ForwarderError),
}

/// 网关：持有全部组件，负责启停顺序
pub struct Gateway {
    store: Arc<VariableStore>,
    forwarder: LogForwarder,
    config_task: Arc<ConfigTask>,
    ingestor: UdpIngestor,
    lifecycle: Lifecycle,
    terminated: AtomicBool,
}

impl Gateway {
    /// 装配组件，需要在 tokio 运行时内调用
    pub fn new(config: &GatewayConfig, sink: Arc<dyn ProtocolSink>) -> Self {
        let store = Arc::new(VariableStore::new(store_config(config), sink));
        let forwarder = LogForwarder::new(forwarder_config(config));
        let config_task = Arc::new(ConfigTask::spawn());
        let router = Arc::new(Router::new(
            Arc::clone(&store),
            forwarder.clone(),
            Arc::clone(&config_task),
        ));
        let ingestor = UdpIngestor::new(ingestor_config(config), router);

        Self {
            store,
            forwarder,
            config_task,
            ingestor,
            lifecycle: Lifecycle::new(),
            terminated: AtomicBool::new(false),
        }
    }

    /// 按顺序启动组件，返回 UDP 接收器实际绑定的地址
    pub async fn start(&self) -> Result<SocketAddr, GatewayError> {
        if self.terminated.load(Ordering::Acquire) {
            return Err(GatewayError::Terminated);
        }
        if !self.lifecycle.begin_start() {
            return Err(GatewayError::AlreadyRunning);
        }

        match self.start_components().await {
            Ok(addr) => {
                self.lifecycle.finish_start();
                info!(
                    target: "tgw.gateway",
                    udp_addr = %addr,
                    log_sink = %self.forwarder.endpoint(),
                    "gateway_started"
                );
                Ok(addr)
            }
            Err(err) => {
                self.lifecycle.abort_start();
                Err(err)
            }
        }
    }

    async fn start_components(&self) -> Result<SocketAddr, GatewayError> {
        self.store.start().await?;

        let addr = match self.ingestor.start().await {
            Ok(addr) => addr,
            Err(err) => {
                self.store.stop().await;
                return Err(err.into());
            }
        };

        if let Err(err) = self.forwarder.start().await {
            self.ingestor.stop().await;
            self.store.stop().await;
            return Err(err.into());
        }
        Ok(addr)
    }

    /// 按顺序停止组件；未运行时为空操作
    pub async fn stop(&self) {
        if !self.lifecycle.begin_stop() {
            return;
        }

        self.ingestor.stop().await;
        self.forwarder.stop().await;
        self.store.stop().await;
        self.config_task.shutdown().await;
        self.terminated.store(true, Ordering::Release);

        self.lifecycle.finish_stop();
        info!(target: "tgw.gateway", "gateway_stopped");
    }
}

fn ingestor_config(config: &GatewayConfig) -> UdpIngestorConfig {
    UdpIngestorConfig {
        host: config.udp_host.clone(),
        port: config.udp_port,
        recv_buffer_bytes: config.udp_recv_buffer_bytes,
        read_timeout: Duration::from_millis(config.udp_read_timeout_ms),
        max_in_flight: config.dispatch_max_in_flight,
        block_on_full: config.dispatch_block_on_full,
    }
}

fn store_config(config: &GatewayConfig) -> VariableStoreConfig {
    VariableStoreConfig {
        sink: ProtocolSinkConfig {
            port: config.opcua_port,
            hostname: config.opcua_hostname.clone(),
            num_groups: config.opcua_num_groups,
            ..Default::default()
        },
        report_interval: Duration::from_millis(config.rate_interval_ms),
    }
}

fn forwarder_config(config: &GatewayConfig) -> LogForwarderConfig {
    LogForwarderConfig {
        endpoint: SinkEndpoint::new(config.log_sink_host.clone(), config.log_sink_port),
        heartbeat_interval: Duration::from_secs(config.log_heartbeat_secs),
        retry: RetryPolicy::new(
            config.log_send_max_retries,
            Duration::from_millis(config.log_send_backoff_ms),
        ),
    }
}
