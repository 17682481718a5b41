//! UDP 接收器实现
//!
//! 接收循环以短超时读取，超时只用于重新检查取消状态；
//! 逐包任务受并发上限约束，`stop()` 会等待所有已派发任务结束。

use crate::{EventHandler, IngestError};
use domain::{EventError, InboundEvent, Lifecycle};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tgw_telemetry::{
    new_trace_id, record_datagram_received, record_datagram_truncated, record_decode_failure,
    record_dropped_backpressure, record_dropped_missing_type, record_dropped_unknown_type,
};
use tokio::net::UdpSocket;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, info, warn};

/// UDP 接收器配置
#[derive(Debug, Clone)]
pub struct UdpIngestorConfig {
    /// 监听地址
    pub host: String,
    /// 监听端口（0 表示由系统分配）
    pub port: u16,
    /// 单次读取缓冲大小，超长数据报会被截断
    pub recv_buffer_bytes: usize,
    /// 单次读取超时
    pub read_timeout: Duration,
    /// 同时处理中的数据报上限
    pub max_in_flight: usize,
    /// 达到上限时阻塞接收循环（否则丢弃新数据报）
    pub block_on_full: bool,
}

impl Default for UdpIngestorConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            recv_buffer_bytes: 4096,
            read_timeout: Duration::from_millis(100),
            max_in_flight: 1024,
            block_on_full: false,
        }
    }
}

/// 运行中的接收循环句柄
struct ReceiverHandle {
    cancel: CancellationToken,
    receive_loop: JoinHandle<()>,
    workers: TaskTracker,
    local_addr: SocketAddr,
}

/// UDP 接收器
pub struct UdpIngestor {
    config: UdpIngestorConfig,
    handler: Arc<dyn EventHandler>,
    lifecycle: Lifecycle,
    running: Mutex<Option<ReceiverHandle>>,
}

impl UdpIngestor {
    pub fn new(config: UdpIngestorConfig, handler: Arc<dyn EventHandler>) -> Self {
        Self {
            config,
            handler,
            lifecycle: Lifecycle::new(),
            running: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &UdpIngestorConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    /// 实际绑定的地址（运行中才有值）
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.lock_running().as_ref().map(|handle| handle.local_addr)
    }

    /// 绑定端口并启动接收循环，返回实际绑定地址
    pub async fn start(&self) -> Result<SocketAddr, IngestError> {
        if !self.lifecycle.begin_start() {
            return Err(IngestError::AlreadyRunning);
        }

        let addr = format!("{}:{}", self.config.host, self.config.port);
        let (socket, local_addr) = match bind_socket(&addr).await {
            Ok(bound) => bound,
            Err(err) => {
                self.lifecycle.abort_start();
                return Err(err);
            }
        };

        let cancel = CancellationToken::new();
        let workers = TaskTracker::new();
        let receiver = ReceiveLoop {
            socket,
            handler: Arc::clone(&self.handler),
            cancel: cancel.clone(),
            workers: workers.clone(),
            permits: Arc::new(Semaphore::new(self.config.max_in_flight.max(1))),
            recv_buffer_bytes: self.config.recv_buffer_bytes.max(1),
            read_timeout: self.config.read_timeout,
            block_on_full: self.config.block_on_full,
        };
        let receive_loop = tokio::spawn(receiver.run());

        *self.lock_running() = Some(ReceiverHandle {
            cancel,
            receive_loop,
            workers,
            local_addr,
        });
        self.lifecycle.finish_start();

        info!(target: "tgw.ingest", local_addr = %local_addr, "udp_ingestor_started");
        Ok(local_addr)
    }

    /// 停止接收循环并等待所有逐包任务结束；未运行时为空操作
    pub async fn stop(&self) {
        if !self.lifecycle.begin_stop() {
            return;
        }

        let handle = self.lock_running().take();
        if let Some(handle) = handle {
            handle.cancel.cancel();
            if let Err(err) = handle.receive_loop.await {
                warn!(target: "tgw.ingest", error = %err, "receive_loop_join_failed");
            }
            handle.workers.close();
            handle.workers.wait().await;
        }

        self.lifecycle.finish_stop();
        info!(target: "tgw.ingest", "udp_ingestor_stopped");
    }

    fn lock_running(&self) -> MutexGuard<'_, Option<ReceiverHandle>> {
        self.running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn bind_socket(addr: &str) -> Result<(UdpSocket, SocketAddr), IngestError> {
    let bind_error = |source| IngestError::Bind {
        addr: addr.to_string(),
        source,
    };
    let socket = UdpSocket::bind(addr).await.map_err(bind_error)?;
    let local_addr = socket.local_addr().map_err(bind_error)?;
    Ok((socket, local_addr))
}

/// 接收循环（独占 socket，退出即关闭）
struct ReceiveLoop {
    socket: UdpSocket,
    handler: Arc<dyn EventHandler>,
    cancel: CancellationToken,
    workers: TaskTracker,
    permits: Arc<Semaphore>,
    recv_buffer_bytes: usize,
    read_timeout: Duration,
    block_on_full: bool,
}

impl ReceiveLoop {
    async fn run(self) {
        let mut buffer = vec![0u8; self.recv_buffer_bytes];

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let received = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                result = tokio::time::timeout(self.read_timeout, self.socket.recv_from(&mut buffer)) => result,
            };

            let (len, peer) = match received {
                // 读取超时：回到循环顶部检查取消状态
                Err(_) => continue,
                Ok(Err(err)) => {
                    warn!(target: "tgw.ingest", error = %err, "udp_read_failed");
                    continue;
                }
                Ok(Ok(pair)) => pair,
            };

            record_datagram_received();
            if len == buffer.len() {
                record_datagram_truncated();
                warn!(
                    target: "tgw.ingest",
                    peer = %peer,
                    len = len,
                    "datagram_possibly_truncated"
                );
            }

            let Some(permit) = self.acquire_permit(peer).await else {
                continue;
            };

            let payload = buffer[..len].to_vec();
            let handler = Arc::clone(&self.handler);
            let span = tracing::info_span!(
                target: "tgw.ingest",
                "datagram",
                trace_id = %new_trace_id(),
                peer = %peer
            );
            self.workers.spawn(
                async move {
                    let _permit = permit;
                    process_datagram(&payload, peer, handler.as_ref()).await;
                }
                .instrument(span),
            );
        }

        debug!(target: "tgw.ingest", "receive_loop_exited");
    }

    async fn acquire_permit(&self, peer: SocketAddr) -> Option<OwnedSemaphorePermit> {
        if self.block_on_full {
            return tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                permit = Arc::clone(&self.permits).acquire_owned() => permit.ok(),
            };
        }

        match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => Some(permit),
            Err(_) => {
                record_dropped_backpressure();
                warn!(target: "tgw.ingest", peer = %peer, "datagram_dropped_backpressure");
                None
            }
        }
    }
}

/// 解码单个数据报并交给处理器。
///
/// 每个被丢弃的数据报只产生一条诊断日志。
pub async fn process_datagram(payload: &[u8], peer: SocketAddr, handler: &dyn EventHandler) {
    let event = match InboundEvent::decode(payload) {
        Ok(event) => event,
        Err(EventError::UnknownType(data_type)) => {
            record_dropped_unknown_type();
            warn!(
                target: "tgw.ingest",
                peer = %peer,
                data_type = %data_type,
                "event_dropped_unknown_type"
            );
            return;
        }
        Err(EventError::MissingType) => {
            record_dropped_missing_type();
            warn!(target: "tgw.ingest", peer = %peer, "event_dropped_missing_type");
            return;
        }
        Err(err) => {
            record_decode_failure();
            warn!(target: "tgw.ingest", peer = %peer, error = %err, "datagram_decode_failed");
            return;
        }
    };

    let kind = event.kind();
    debug!(target: "tgw.ingest", kind = %kind, "event_decoded");
    if let Err(err) = handler.handle(event).await {
        warn!(target: "tgw.ingest", kind = %kind, error = %err, "event_handler_failed");
    }
}
