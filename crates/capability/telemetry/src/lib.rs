//! 追踪初始化、trace_id 生成与进程内计数器。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 计数器快照。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub datagrams_received: u64,
    pub datagrams_truncated: u64,
    pub decode_failures: u64,
    pub dropped_missing_type: u64,
    pub dropped_unknown_type: u64,
    pub dropped_backpressure: u64,
    pub variable_updates: u64,
    pub config_events: u64,
    pub logs_forwarded: u64,
    pub logs_dropped: u64,
    pub log_send_failures: u64,
    pub heartbeats_sent: u64,
    pub last_packet_rate: u64,
}

/// 网关计数器。
pub struct GatewayMetrics {
    datagrams_received: AtomicU64,
    datagrams_truncated: AtomicU64,
    decode_failures: AtomicU64,
    dropped_missing_type: AtomicU64,
    dropped_unknown_type: AtomicU64,
    dropped_backpressure: AtomicU64,
    variable_updates: AtomicU64,
    config_events: AtomicU64,
    logs_forwarded: AtomicU64,
    logs_dropped: AtomicU64,
    log_send_failures: AtomicU64,
    heartbeats_sent: AtomicU64,
    last_packet_rate: AtomicU64,
}

impl Default for GatewayMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self {
            datagrams_received: AtomicU64::new(0),
            datagrams_truncated: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            dropped_missing_type: AtomicU64::new(0),
            dropped_unknown_type: AtomicU64::new(0),
            dropped_backpressure: AtomicU64::new(0),
            variable_updates: AtomicU64::new(0),
            config_events: AtomicU64::new(0),
            logs_forwarded: AtomicU64::new(0),
            logs_dropped: AtomicU64::new(0),
            log_send_failures: AtomicU64::new(0),
            heartbeats_sent: AtomicU64::new(0),
            last_packet_rate: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            datagrams_received: self.datagrams_received.load(Ordering::Relaxed),
            datagrams_truncated: self.datagrams_truncated.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            dropped_missing_type: self.dropped_missing_type.load(Ordering::Relaxed),
            dropped_unknown_type: self.dropped_unknown_type.load(Ordering::Relaxed),
            dropped_backpressure: self.dropped_backpressure.load(Ordering::Relaxed),
            variable_updates: self.variable_updates.load(Ordering::Relaxed),
            config_events: self.config_events.load(Ordering::Relaxed),
            logs_forwarded: self.logs_forwarded.load(Ordering::Relaxed),
            logs_dropped: self.logs_dropped.load(Ordering::Relaxed),
            log_send_failures: self.log_send_failures.load(Ordering::Relaxed),
            heartbeats_sent: self.heartbeats_sent.load(Ordering::Relaxed),
            last_packet_rate: self.last_packet_rate.load(Ordering::Relaxed),
        }
    }
}

static METRICS: OnceLock<GatewayMetrics> = OnceLock::new();

/// 获取全局计数器实例。
pub fn metrics() -> &'static GatewayMetrics {
    METRICS.get_or_init(GatewayMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 为单个数据报的处理生成 trace_id。
pub fn new_trace_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// 记录收到的数据报。
pub fn record_datagram_received() {
    metrics().datagrams_received.fetch_add(1, Ordering::Relaxed);
}

/// 记录可能被截断的数据报（长度达到接收缓冲上限）。
pub fn record_datagram_truncated() {
    metrics().datagrams_truncated.fetch_add(1, Ordering::Relaxed);
}

pub fn record_decode_failure() {
    metrics().decode_failures.fetch_add(1, Ordering::Relaxed);
}

pub fn record_dropped_missing_type() {
    metrics().dropped_missing_type.fetch_add(1, Ordering::Relaxed);
}

pub fn record_dropped_unknown_type() {
    metrics().dropped_unknown_type.fetch_add(1, Ordering::Relaxed);
}

/// 记录因并发上限被拒绝的数据报。
pub fn record_dropped_backpressure() {
    metrics().dropped_backpressure.fetch_add(1, Ordering::Relaxed);
}

pub fn record_variable_update() {
    metrics().variable_updates.fetch_add(1, Ordering::Relaxed);
}

pub fn record_config_event() {
    metrics().config_events.fetch_add(1, Ordering::Relaxed);
}

pub fn record_log_forwarded() {
    metrics().logs_forwarded.fetch_add(1, Ordering::Relaxed);
}

/// 记录转发器未运行时被静默丢弃的日志。
pub fn record_log_dropped() {
    metrics().logs_dropped.fetch_add(1, Ordering::Relaxed);
}

pub fn record_log_send_failure() {
    metrics().log_send_failures.fetch_add(1, Ordering::Relaxed);
}

pub fn record_heartbeat_sent() {
    metrics().heartbeats_sent.fetch_add(1, Ordering::Relaxed);
}

/// 记录最近一个统计周期的包速率。
pub fn record_packet_rate(count: u64) {
    metrics().last_packet_rate.store(count, Ordering::Relaxed);
}
