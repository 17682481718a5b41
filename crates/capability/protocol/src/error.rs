//! 协议错误类型定义

/// 协议汇错误
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// 重复启动
    #[error("variable store already running")]
    AlreadyRunning,

    /// 协议汇拒绝或不可用
    #[error("protocol sink error: {0}")]
    Sink(String),

    /// 统计周期为 0
    #[error("rate report interval must be non-zero")]
    ZeroInterval,
}
