//! 变量存储与速率监控
//!
//! 每次变量更新计数一次；后台任务按统计周期读取并清零计数，
//! 非零时产生一次速率观测。

use crate::error::ProtocolError;
use crate::sink::ProtocolSink;
use crate::types::ProtocolSinkConfig;
use domain::{Lifecycle, LifecycleState, VariableUpdate};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tgw_telemetry::{record_packet_rate, record_variable_update};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const RATE_CHANNEL_CAPACITY: usize = 16;

/// 包计数器，`take` 原子地读取并清零
#[derive(Debug, Default)]
pub struct PacketCounter {
    count: AtomicU64,
}

impl PacketCounter {
    pub fn increment(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    pub fn take(&self) -> u64 {
        self.count.swap(0, Ordering::AcqRel)
    }

    pub fn get(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }
}

/// 一个统计周期内的包数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateObservation {
    pub count: u64,
    pub interval: Duration,
}

/// 变量存储配置
#[derive(Debug, Clone)]
pub struct VariableStoreConfig {
    pub sink: ProtocolSinkConfig,
    pub report_interval: Duration,
}

impl Default for VariableStoreConfig {
    fn default() -> Self {
        Self {
            sink: ProtocolSinkConfig::default(),
            report_interval: Duration::from_secs(1),
        }
    }
}

struct MonitorHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// 变量存储
pub struct VariableStore {
    config: VariableStoreConfig,
    sink: Arc<dyn ProtocolSink>,
    counter: Arc<PacketCounter>,
    lifecycle: Lifecycle,
    monitor: Mutex<Option<MonitorHandle>>,
    rates: broadcast::Sender<RateObservation>,
}

impl VariableStore {
    pub fn new(config: VariableStoreConfig, sink: Arc<dyn ProtocolSink>) -> Self {
        let (rates, _) = broadcast::channel(RATE_CHANNEL_CAPACITY);
        Self {
            config,
            sink,
            counter: Arc::new(PacketCounter::default()),
            lifecycle: Lifecycle::new(),
            monitor: Mutex::new(None),
            rates,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn packet_count(&self) -> u64 {
        self.counter.get()
    }

    /// 订阅速率观测
    pub fn subscribe_rates(&self) -> broadcast::Receiver<RateObservation> {
        self.rates.subscribe()
    }

    /// 打开协议汇并启动速率监控
    pub async fn start(&self) -> Result<(), ProtocolError> {
        if self.config.report_interval.is_zero() {
            return Err(ProtocolError::ZeroInterval);
        }
        if !self.lifecycle.begin_start() {
            return Err(ProtocolError::AlreadyRunning);
        }

        if let Err(err) = self.sink.open(&self.config.sink).await {
            self.lifecycle.abort_start();
            return Err(err);
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(monitor_rates(
            Arc::clone(&self.counter),
            self.config.report_interval,
            cancel.clone(),
            self.rates.clone(),
        ));
        *self.lock_monitor() = Some(MonitorHandle { cancel, task });
        self.lifecycle.finish_start();

        info!(
            target: "tgw.protocol",
            port = self.config.sink.port,
            "variable_store_started"
        );
        Ok(())
    }

    /// 停止速率监控并释放协议汇；未运行时为空操作
    pub async fn stop(&self) {
        if !self.lifecycle.begin_stop() {
            return;
        }

        let handle = self.lock_monitor().take();
        if let Some(handle) = &handle {
            handle.cancel.cancel();
        }
        self.sink.close().await;
        if let Some(handle) = handle {
            if let Err(err) = handle.task.await {
                warn!(target: "tgw.protocol", error = %err, "rate_monitor_join_failed");
            }
        }

        self.lifecycle.finish_stop();
        info!(target: "tgw.protocol", "variable_store_stopped");
    }

    /// 处理一次变量更新：计数、记录、转发到协议汇。不会失败。
    pub async fn handle_variable_update(&self, update: VariableUpdate) {
        self.counter.increment();
        record_variable_update();
        info!(
            target: "tgw.protocol",
            tag = %update.tag,
            path = %update.path,
            value = %update.value,
            status_code = update.status_code,
            namespace = %update.namespace,
            "variable_update"
        );

        if !self.lifecycle.is_running() {
            debug!(target: "tgw.protocol", tag = %update.tag, "protocol_sink_not_open");
            return;
        }
        if let Err(err) = self.sink.publish(&update).await {
            warn!(
                target: "tgw.protocol",
                tag = %update.tag,
                error = %err,
                "protocol_sink_publish_failed"
            );
        }
    }

    fn lock_monitor(&self) -> MutexGuard<'_, Option<MonitorHandle>> {
        self.monitor
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn monitor_rates(
    counter: Arc<PacketCounter>,
    interval: Duration,
    cancel: CancellationToken,
    rates: broadcast::Sender<RateObservation>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if let Some(observation) = observe_rate(&counter, interval) {
                    // 没有订阅者时发送失败，忽略
                    let _ = rates.send(observation);
                }
            }
        }
    }
}

/// 读取并清零计数；非零时记录一次速率观测
pub fn observe_rate(counter: &PacketCounter, interval: Duration) -> Option<RateObservation> {
    let count = counter.take();
    if count == 0 {
        return None;
    }
    record_packet_rate(count);
    info!(
        target: "tgw.protocol",
        packets = count,
        interval_ms = interval.as_millis() as u64,
        "packet_rate"
    );
    Some(RateObservation { count, interval })
}
