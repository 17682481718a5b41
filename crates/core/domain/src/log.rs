//! 远端日志记录。

use crate::data::EventFields;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

pub const DEFAULT_LEVEL: &str = "INFO";
pub const DEFAULT_MESSAGE: &str = "No message provided";

/// 日志记录：调用方字段原样保留，发送前补齐 timestamp/level/message。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct LogRecord {
    fields: EventFields,
}

impl LogRecord {
    pub fn new(fields: EventFields) -> Self {
        Self { fields }
    }

    /// 构造一条只含三个必备字段的记录。
    pub fn with_message(level: &str, message: &str, at: DateTime<Utc>) -> Self {
        let mut fields = EventFields::new();
        fields.insert("timestamp".to_string(), Value::String(iso8601(at)));
        fields.insert("level".to_string(), Value::String(level.to_string()));
        fields.insert("message".to_string(), Value::String(message.to_string()));
        Self { fields }
    }

    pub fn fields(&self) -> &EventFields {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    /// 补齐缺省字段。缺失、`null` 或空串都视为未提供。
    pub fn normalized(mut self, now: DateTime<Utc>) -> Self {
        fill_default(&mut self.fields, "timestamp", || iso8601(now));
        fill_default(&mut self.fields, "level", || DEFAULT_LEVEL.to_string());
        fill_default(&mut self.fields, "message", || DEFAULT_MESSAGE.to_string());
        self
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.fields)
    }
}

impl From<EventFields> for LogRecord {
    fn from(fields: EventFields) -> Self {
        Self::new(fields)
    }
}

/// RFC 3339 / ISO-8601，秒精度，UTC 以 `Z` 结尾。
pub fn iso8601(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn fill_default(fields: &mut EventFields, key: &str, default: impl FnOnce() -> String) {
    let missing = match fields.get(key) {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    };
    if missing {
        fields.insert(key.to_string(), Value::String(default()));
    }
}
