//! 入站事件：在接入边界一次性解析为具体变体。

use crate::data::{EventFields, VariableUpdate};
use crate::log::LogRecord;
use serde_json::Value;
use std::fmt;

/// 事件判别字段名。
pub const DISCRIMINATOR: &str = "type";

/// 事件解析错误。
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload is not a json object")]
    NotAnObject,
    #[error("missing or invalid data type")]
    MissingType,
    #[error("unknown data type: {0}")]
    UnknownType(String),
}

/// 事件种类，与 `"type"` 取值一一对应。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Variable,
    AuthConfig,
    Users,
    Log,
    LogSinkConfig,
    InterfaceConfig,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::Variable,
        EventKind::AuthConfig,
        EventKind::Users,
        EventKind::Log,
        EventKind::LogSinkConfig,
        EventKind::InterfaceConfig,
    ];

    pub fn from_discriminator(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Variable => "opcua",
            EventKind::AuthConfig => "opcua_auth_config",
            EventKind::Users => "opcua_users",
            EventKind::Log => "log",
            EventKind::LogSinkConfig => "secondary_log_config",
            EventKind::InterfaceConfig => "receive_interface_config",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 入站事件。
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Variable(VariableUpdate),
    AuthConfig(EventFields),
    Users(EventFields),
    Log(LogRecord),
    LogSinkConfig(EventFields),
    InterfaceConfig(EventFields),
}

impl InboundEvent {
    /// 解码一个数据报负载。
    pub fn decode(payload: &[u8]) -> Result<Self, EventError> {
        let value: Value = serde_json::from_slice(payload)?;
        Self::from_value(value)
    }

    /// 从已解析的 JSON 值分类。
    ///
    /// 非对象为 `NotAnObject`；`"type"` 缺失或非字符串为 `MissingType`；
    /// 未知取值为 `UnknownType`。其余字段宽松处理。
    pub fn from_value(value: Value) -> Result<Self, EventError> {
        let Value::Object(fields) = value else {
            return Err(EventError::NotAnObject);
        };
        let kind = match fields.get(DISCRIMINATOR) {
            Some(Value::String(tag)) => EventKind::from_discriminator(tag)
                .ok_or_else(|| EventError::UnknownType(tag.clone()))?,
            _ => return Err(EventError::MissingType),
        };
        Ok(match kind {
            EventKind::Variable => InboundEvent::Variable(VariableUpdate::from_fields(&fields)),
            EventKind::AuthConfig => InboundEvent::AuthConfig(fields),
            EventKind::Users => InboundEvent::Users(fields),
            EventKind::Log => InboundEvent::Log(LogRecord::new(fields)),
            EventKind::LogSinkConfig => InboundEvent::LogSinkConfig(fields),
            EventKind::InterfaceConfig => InboundEvent::InterfaceConfig(fields),
        })
    }

    pub fn kind(&self) -> EventKind {
        match self {
            InboundEvent::Variable(_) => EventKind::Variable,
            InboundEvent::AuthConfig(_) => EventKind::AuthConfig,
            InboundEvent::Users(_) => EventKind::Users,
            InboundEvent::Log(_) => EventKind::Log,
            InboundEvent::LogSinkConfig(_) => EventKind::LogSinkConfig,
            InboundEvent::InterfaceConfig(_) => EventKind::InterfaceConfig,
        }
    }
}
