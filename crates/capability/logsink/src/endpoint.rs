use domain::EventFields;
use serde_json::Value;
use std::fmt;

pub const DEFAULT_HOST: &str = "192.168.2.112";
pub const DEFAULT_PORT: u16 = 1514;

/// 远端日志收集器地址
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkEndpoint {
    pub host: String,
    pub port: u16,
}

impl Default for SinkEndpoint {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl fmt::Display for SinkEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl SinkEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// 按 `{"ip": ..., "port": ...}` 更新，类型不符的值忽略。
    ///
    /// 返回是否有字段被修改。
    pub fn apply(&mut self, fields: &EventFields) -> bool {
        let mut changed = false;
        if let Some(host) = fields.get("ip").and_then(Value::as_str) {
            if !host.is_empty() && host != self.host {
                self.host = host.to_string();
                changed = true;
            }
        }
        if let Some(port) = fields.get("port").and_then(parse_port) {
            if port != self.port {
                self.port = port;
                changed = true;
            }
        }
        changed
    }
}

/// 端口必须是 1..=65535 的整数（允许 `9000.0` 这种整数值浮点）
fn parse_port(value: &Value) -> Option<u16> {
    let raw = match value.as_u64() {
        Some(v) => v,
        None => {
            let v = value.as_f64()?;
            if v.fract() != 0.0 || v < 0.0 || v > f64::from(u16::MAX) {
                return None;
            }
            v as u64
        }
    };
    u16::try_from(raw).ok().filter(|port| *port != 0)
}
