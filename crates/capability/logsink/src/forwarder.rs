//! 日志转发器
//!
//! 每条记录补齐缺省字段后序列化为一个 JSON 数据报发往收集器。
//! 投递语义为至多一次：未运行时丢弃，发送失败只记日志，不向调用方报错。

use crate::endpoint::SinkEndpoint;
use crate::error::ForwarderError;
use crate::retry::{RetryPolicy, send_with_retry};
use chrono::Utc;
use domain::log::DEFAULT_LEVEL;
use domain::{EventFields, Lifecycle, LifecycleState, LogRecord};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tgw_telemetry::{
    record_heartbeat_sent, record_log_dropped, record_log_forwarded, record_log_send_failure,
};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const HEARTBEAT_MESSAGE: &str = "Heartbeat from log forwarder";

#[derive(Debug, Clone)]
pub struct LogForwarderConfig {
    pub endpoint: SinkEndpoint,
    pub heartbeat_interval: Duration,
    pub retry: RetryPolicy,
}

impl Default for LogForwarderConfig {
    fn default() -> Self {
        Self {
            endpoint: SinkEndpoint::default(),
            heartbeat_interval: Duration::from_secs(30),
            retry: RetryPolicy::at_most_once(),
        }
    }
}

struct Connection {
    socket: Arc<UdpSocket>,
    endpoint: SinkEndpoint,
    cancel: CancellationToken,
    heartbeat: JoinHandle<()>,
}

struct Inner {
    heartbeat_interval: Duration,
    retry: RetryPolicy,
    endpoint: Mutex<SinkEndpoint>,
    lifecycle: Lifecycle,
    connection: Mutex<Option<Connection>>,
}

/// 远端日志转发器，可廉价克隆
#[derive(Clone)]
pub struct LogForwarder {
    inner: Arc<Inner>,
}

impl LogForwarder {
    pub fn new(config: LogForwarderConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                heartbeat_interval: config.heartbeat_interval,
                retry: config.retry,
                endpoint: Mutex::new(config.endpoint),
                lifecycle: Lifecycle::new(),
                connection: Mutex::new(None),
            }),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.lifecycle.state()
    }

    pub fn is_running(&self) -> bool {
        self.inner.lifecycle.is_running()
    }

    /// 当前记录的收集器地址（下一次 `start` 使用）
    pub fn endpoint(&self) -> SinkEndpoint {
        lock(&self.inner.endpoint).clone()
    }

    /// 已打开连接实际指向的地址
    pub fn active_endpoint(&self) -> Option<SinkEndpoint> {
        lock(&self.inner.connection)
            .as_ref()
            .map(|connection| connection.endpoint.clone())
    }

    /// 连接记录的收集器地址并启动心跳
    pub async fn start(&self) -> Result<(), ForwarderError> {
        if self.inner.heartbeat_interval.is_zero() {
            return Err(ForwarderError::ZeroHeartbeatInterval);
        }
        if !self.inner.lifecycle.begin_start() {
            return Err(ForwarderError::AlreadyRunning);
        }

        let endpoint = self.endpoint();
        let socket = match connect(&endpoint).await {
            Ok(socket) => Arc::new(socket),
            Err(err) => {
                self.inner.lifecycle.abort_start();
                return Err(err);
            }
        };

        let cancel = CancellationToken::new();
        let heartbeat = tokio::spawn(heartbeat_loop(
            self.clone(),
            self.inner.heartbeat_interval,
            cancel.clone(),
        ));
        *lock(&self.inner.connection) = Some(Connection {
            socket,
            endpoint: endpoint.clone(),
            cancel,
            heartbeat,
        });
        self.inner.lifecycle.finish_start();

        info!(target: "tgw.logsink", endpoint = %endpoint, "log_forwarder_started");
        Ok(())
    }

    /// 停止心跳并关闭连接；未运行时为空操作
    pub async fn stop(&self) {
        if !self.inner.lifecycle.begin_stop() {
            return;
        }

        let connection = lock(&self.inner.connection).take();
        if let Some(connection) = connection {
            connection.cancel.cancel();
            if let Err(err) = connection.heartbeat.await {
                warn!(target: "tgw.logsink", error = %err, "heartbeat_join_failed");
            }
        }

        self.inner.lifecycle.finish_stop();
        info!(target: "tgw.logsink", "log_forwarder_stopped");
    }

    /// 转发一条日志；任何失败都只记录日志
    pub async fn send_log(&self, record: LogRecord) {
        self.deliver(record).await;
    }

    /// 返回记录是否已发出
    async fn deliver(&self, record: LogRecord) -> bool {
        match self.try_send_log(record).await {
            Ok(()) => {
                record_log_forwarded();
                true
            }
            Err(ForwarderError::NotRunning) => {
                record_log_dropped();
                debug!(target: "tgw.logsink", "log_dropped_not_running");
                false
            }
            Err(err) => {
                record_log_send_failure();
                warn!(
                    target: "tgw.logsink",
                    endpoint = ?self.active_endpoint(),
                    error = %err,
                    "log_send_failed"
                );
                false
            }
        }
    }

    /// 与 `send_log` 相同，但把失败原因返回给调用方
    pub async fn try_send_log(&self, record: LogRecord) -> Result<(), ForwarderError> {
        let socket = self.current_socket().ok_or(ForwarderError::NotRunning)?;
        let payload = record.normalized(Utc::now()).to_json()?;

        send_with_retry(&self.inner.retry, || socket.send(&payload))
            .await
            .map_err(ForwarderError::Send)?;
        Ok(())
    }

    /// 更新记录的收集器地址。已打开的连接不受影响，新地址在下一次 `start` 生效。
    pub fn config_log(&self, fields: &EventFields) -> SinkEndpoint {
        let endpoint = {
            let mut endpoint = lock(&self.inner.endpoint);
            endpoint.apply(fields);
            endpoint.clone()
        };
        info!(
            target: "tgw.logsink",
            endpoint = %endpoint,
            staged = self.is_running(),
            "log_sink_reconfigured"
        );
        endpoint
    }

    fn current_socket(&self) -> Option<Arc<UdpSocket>> {
        if !self.inner.lifecycle.is_running() {
            return None;
        }
        lock(&self.inner.connection)
            .as_ref()
            .map(|connection| Arc::clone(&connection.socket))
    }
}

async fn connect(endpoint: &SinkEndpoint) -> Result<UdpSocket, ForwarderError> {
    let resolve_err = |source| ForwarderError::Resolve {
        endpoint: endpoint.clone(),
        source,
    };
    let addr = tokio::net::lookup_host((endpoint.host.as_str(), endpoint.port))
        .await
        .map_err(resolve_err)?
        .next()
        .ok_or_else(|| {
            resolve_err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no address for host",
            ))
        })?;

    let connect_err = |source| ForwarderError::Connect {
        endpoint: endpoint.clone(),
        source,
    };
    let local = if addr.is_ipv4() {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
    } else {
        SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
    };
    let socket = UdpSocket::bind(local).await.map_err(connect_err)?;
    socket.connect(addr).await.map_err(connect_err)?;
    Ok(socket)
}

async fn heartbeat_loop(forwarder: LogForwarder, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                emit_heartbeat(&forwarder).await;
            }
        }
    }
}

/// 心跳只在实际发出后计数
async fn emit_heartbeat(forwarder: &LogForwarder) -> bool {
    let record = LogRecord::with_message(DEFAULT_LEVEL, HEARTBEAT_MESSAGE, Utc::now());
    let delivered = forwarder.deliver(record).await;
    if delivered {
        record_heartbeat_sent();
    }
    delivered
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
