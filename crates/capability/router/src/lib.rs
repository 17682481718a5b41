//! # 事件路由
//!
//! 每个 `InboundEvent` 恰好交给一个处理者：
//!
//! | 事件类型 | 处理者 |
//! |---|---|
//! | `opcua` | `VariableStore::handle_variable_update` |
//! | `log` | `LogForwarder::send_log` |
//! | `opcua_auth_config` / `opcua_users` / `secondary_log_config` / `receive_interface_config` | 配置任务 |
//!
//! 各处理者只持有自己的状态，路由本身无锁。

mod config;

use async_trait::async_trait;
use domain::InboundEvent;
use std::sync::Arc;
use tgw_ingest::{EventHandler, IngestError};
use tgw_logsink::LogForwarder;
use tgw_protocol::VariableStore;
use tracing::debug;

pub use config::{ConfigSnapshot, ConfigTask, ConfigUpdate};

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("config task is not running")]
    ConfigChannelClosed,
}

/// 事件路由器
pub struct Router {
    store: Arc<VariableStore>,
    forwarder: LogForwarder,
    config: Arc<ConfigTask>,
}

impl Router {
    pub fn new(store: Arc<VariableStore>, forwarder: LogForwarder, config: Arc<ConfigTask>) -> Self {
        Self {
            store,
            forwarder,
            config,
        }
    }

    pub async fn dispatch(&self, event: InboundEvent) -> Result<(), RouterError> {
        let kind = event.kind();
        match event {
            InboundEvent::Variable(update) => self.store.handle_variable_update(update).await,
            InboundEvent::Log(record) => self.forwarder.send_log(record).await,
            InboundEvent::AuthConfig(fields) => {
                self.config.apply(ConfigUpdate::Auth(fields)).await?
            }
            InboundEvent::Users(fields) => self.config.apply(ConfigUpdate::Users(fields)).await?,
            InboundEvent::LogSinkConfig(fields) => {
                self.config.apply(ConfigUpdate::LogSink(fields)).await?
            }
            InboundEvent::InterfaceConfig(fields) => {
                self.config.apply(ConfigUpdate::Interface(fields)).await?
            }
        }
        debug!(target: "tgw.router", kind = %kind, "event_dispatched");
        Ok(())
    }
}

#[async_trait]
impl EventHandler for Router {
    async fn handle(&self, event: InboundEvent) -> Result<(), IngestError> {
        self.dispatch(event)
            .await
            .map_err(|err| IngestError::Handler(err.to_string()))
    }
}
