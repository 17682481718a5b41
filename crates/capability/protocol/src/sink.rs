//! 协议汇抽象
//!
//! 真正的协议服务（安全协商、地址空间、会话）在外部实现，
//! 网关只负责打开、推送变量更新、关闭。

use crate::error::ProtocolError;
use crate::types::ProtocolSinkConfig;
use async_trait::async_trait;
use domain::VariableUpdate;
use tracing::{debug, info};

/// 协议汇
#[async_trait]
pub trait ProtocolSink: Send + Sync {
    async fn open(&self, config: &ProtocolSinkConfig) -> Result<(), ProtocolError>;
    async fn publish(&self, update: &VariableUpdate) -> Result<(), ProtocolError>;
    async fn close(&self);
}

/// 仅记录日志的协议汇（外部协议服务的进程内替身）
#[derive(Debug, Default)]
pub struct LoggingProtocolSink;

#[async_trait]
impl ProtocolSink for LoggingProtocolSink {
    async fn open(&self, config: &ProtocolSinkConfig) -> Result<(), ProtocolError> {
        info!(
            target: "tgw.protocol",
            endpoints = ?config.endpoints(),
            security_bindings = config.security.len(),
            auth_modes = ?config.auth_modes,
            num_groups = config.num_groups,
            "protocol_sink_opened"
        );
        Ok(())
    }

    async fn publish(&self, update: &VariableUpdate) -> Result<(), ProtocolError> {
        debug!(
            target: "tgw.protocol",
            tag = %update.tag,
            namespace = %update.namespace,
            "protocol_sink_publish"
        );
        Ok(())
    }

    async fn close(&self) {
        info!(target: "tgw.protocol", "protocol_sink_closed");
    }
}
