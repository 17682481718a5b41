//! # 远端日志能力模块
//!
//! 把日志记录以 JSON 数据报转发到远端收集器，周期发送心跳，
//! 支持运行时更新收集器地址。
//!
//! ## 架构设计
//!
//! ```text
//! Router ("log" 事件) ──▶ LogForwarder::send_log ──补齐字段──▶ UDP 数据报 ──▶ 收集器
//!                               ▲
//!                 心跳任务 ─────┘（每 30 秒一条 INFO）
//!
//! config_log({"ip", "port"}) ──▶ SinkEndpoint（下一次 start 生效）
//! ```
//!
//! ## 投递语义
//!
//! 默认至多一次。需要更强保证时配置 [`RetryPolicy`]，重试逻辑独立于发送路径，
//! 见 [`send_with_retry`]。

mod endpoint;
mod error;
mod forwarder;
mod retry;

pub use endpoint::{DEFAULT_HOST, DEFAULT_PORT, SinkEndpoint};
pub use error::ForwarderError;
pub use forwarder::{HEARTBEAT_MESSAGE, LogForwarder, LogForwarderConfig};
pub use retry::{RetryPolicy, send_with_retry};
