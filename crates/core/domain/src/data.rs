use serde::Serialize;
use serde_json::{Map, Value};

/// 事件负载的字段集合（保持原始字段顺序）。
pub type EventFields = Map<String, Value>;

/// 协议变量更新（一次带状态码的点位测量）。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableUpdate {
    pub tag: String,
    pub path: String,
    pub value: Value,
    pub status_code: u32,
    pub namespace: String,
}

impl VariableUpdate {
    /// 从 `"opcua"` 事件字段宽松提取。
    ///
    /// 缺失或类型不符的字段取零值，不会因此拒绝事件。
    pub fn from_fields(fields: &EventFields) -> Self {
        Self {
            tag: string_field(fields, "tag"),
            path: string_field(fields, "path"),
            value: fields.get("value").cloned().unwrap_or(Value::Null),
            status_code: fields.get("status_code").map(coerce_status_code).unwrap_or(0),
            namespace: string_field(fields, "namespace"),
        }
    }
}

/// 读取字符串字段，非字符串按空串处理。
pub fn string_field(fields: &EventFields, key: &str) -> String {
    fields
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// 状态码收敛到 u32：向零截断并饱和到 `0..=u32::MAX`，非数值为 0。
pub fn coerce_status_code(value: &Value) -> u32 {
    if let Some(v) = value.as_u64() {
        return u32::try_from(v).unwrap_or(u32::MAX);
    }
    match value.as_f64() {
        // `as` 对 f64 -> u32 饱和转换，NaN 为 0
        Some(v) => v.trunc() as u32,
        None => 0,
    }
}
