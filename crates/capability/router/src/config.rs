//! 配置任务
//!
//! 认证、用户、日志汇、接收接口四类配置事件只由这一个任务写入，
//! 其他组件通过消息读写，彼此不共享锁。

use crate::RouterError;
use domain::{EventFields, EventKind};
use std::sync::Mutex;
use tgw_telemetry::record_config_event;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// 一次配置更新
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigUpdate {
    Auth(EventFields),
    Users(EventFields),
    LogSink(EventFields),
    Interface(EventFields),
}

impl ConfigUpdate {
    pub fn kind(&self) -> EventKind {
        match self {
            ConfigUpdate::Auth(_) => EventKind::AuthConfig,
            ConfigUpdate::Users(_) => EventKind::Users,
            ConfigUpdate::LogSink(_) => EventKind::LogSinkConfig,
            ConfigUpdate::Interface(_) => EventKind::InterfaceConfig,
        }
    }
}

/// 每类配置最近一次收到的内容
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigSnapshot {
    pub auth: Option<EventFields>,
    pub users: Option<EventFields>,
    pub log_sink: Option<EventFields>,
    pub interface: Option<EventFields>,
    pub applied: u64,
}

enum ConfigCommand {
    Apply(ConfigUpdate),
    Snapshot(oneshot::Sender<ConfigSnapshot>),
}

/// 配置任务句柄
pub struct ConfigTask {
    commands: mpsc::Sender<ConfigCommand>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ConfigTask {
    /// 启动配置任务，需要在 tokio 运行时内调用
    pub fn spawn() -> Self {
        let (commands, receiver) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(receiver, cancel.clone()));
        Self {
            commands,
            cancel,
            task: Mutex::new(Some(task)),
        }
    }

    pub async fn apply(&self, update: ConfigUpdate) -> Result<(), RouterError> {
        self.commands
            .send(ConfigCommand::Apply(update))
            .await
            .map_err(|_| RouterError::ConfigChannelClosed)
    }

    pub async fn snapshot(&self) -> Result<ConfigSnapshot, RouterError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(ConfigCommand::Snapshot(reply))
            .await
            .map_err(|_| RouterError::ConfigChannelClosed)?;
        response.await.map_err(|_| RouterError::ConfigChannelClosed)
    }

    /// 停止任务并等待其退出；重复调用为空操作
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let task = self
            .task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                warn!(target: "tgw.router", error = %err, "config_task_join_failed");
            }
        }
    }
}

async fn run(mut commands: mpsc::Receiver<ConfigCommand>, cancel: CancellationToken) {
    let mut state = ConfigSnapshot::default();
    loop {
        let command = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            command = commands.recv() => match command {
                Some(command) => command,
                None => break,
            },
        };
        match command {
            ConfigCommand::Apply(update) => apply(&mut state, update),
            ConfigCommand::Snapshot(reply) => {
                let _ = reply.send(state.clone());
            }
        }
    }
    debug!(target: "tgw.router", applied = state.applied, "config_task_exited");
}

fn apply(state: &mut ConfigSnapshot, update: ConfigUpdate) {
    record_config_event();
    state.applied += 1;
    let kind = update.kind();
    let (slot, fields) = match update {
        ConfigUpdate::Auth(fields) => (&mut state.auth, fields),
        ConfigUpdate::Users(fields) => (&mut state.users, fields),
        ConfigUpdate::LogSink(fields) => (&mut state.log_sink, fields),
        ConfigUpdate::Interface(fields) => (&mut state.interface, fields),
    };
    info!(
        target: "tgw.router",
        kind = %kind,
        payload = %serde_json::Value::Object(fields.clone()),
        "config_event_received"
    );
    *slot = Some(fields);
}
