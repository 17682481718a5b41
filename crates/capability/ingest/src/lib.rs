//! # UDP 接入能力模块
//!
//! 每个数据报承载一个 JSON 对象，在接入边界解析为 `InboundEvent`，
//! 再交给 `EventHandler` 在独立任务中处理。
//!
//! ```text
//! UdpSocket ──recv_from(超时 100ms)──▶ 接收循环
//!                                        │  Semaphore（并发上限 / 背压）
//!                                        ▼
//!                            TaskTracker 中的逐包任务
//!                                        │  InboundEvent::decode
//!                                        ▼
//!                                  EventHandler
//! ```

mod udp;

use async_trait::async_trait;
use domain::InboundEvent;

pub use udp::{UdpIngestor, UdpIngestorConfig, process_datagram};

/// 接入错误。
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("failed to bind udp socket on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("udp ingestor already running")]
    AlreadyRunning,
    #[error("handler error: {0}")]
    Handler(String),
}

/// InboundEvent 处理器。
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: InboundEvent) -> Result<(), IngestError>;
}
