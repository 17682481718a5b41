use crate::endpoint::SinkEndpoint;

/// 日志转发错误
#[derive(Debug, thiserror::Error)]
pub enum ForwarderError {
    #[error("log forwarder already running")]
    AlreadyRunning,

    #[error("log forwarder not running")]
    NotRunning,

    #[error("heartbeat interval must be non-zero")]
    ZeroHeartbeatInterval,

    #[error("failed to resolve log sink {endpoint}")]
    Resolve {
        endpoint: SinkEndpoint,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to connect to log sink {endpoint}")]
    Connect {
        endpoint: SinkEndpoint,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize log record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to send log record: {0}")]
    Send(#[source] std::io::Error),
}
