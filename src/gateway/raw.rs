//! RawResult：执行引擎返回值的显式标签联合
//!
//! 引擎的返回形状不固定（列表、描述到文本的映射、带 tasks_output 的对象、只有 raw 的对象、标量或空），
//! 在网关边界由 `RawResult::from_value` 一次性适配，下游按枚举穷举处理。

use std::fmt;

use serde_json::Value;

/// tasks_output 集合：列表形或映射形
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Collection {
    List(Vec<String>),
    /// 保持引擎给出的键顺序
    Map(Vec<(String, String)>),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RawResult {
    /// 每个任务一项，按任务顺序
    List(Vec<String>),
    /// 任务描述 -> 输出文本
    Map(Vec<(String, String)>),
    ObjectWithCollection {
        items: Collection,
        raw: Option<String>,
    },
    ObjectWithRaw(String),
    Scalar(String),
    #[default]
    Empty,
}

impl RawResult {
    /// 从任意 JSON 适配：数组 -> List，含 tasks_output 的对象 -> ObjectWithCollection，
    /// 含 raw 的对象 -> ObjectWithRaw，其他对象 -> Map，字符串 / 数字 / 布尔 -> Scalar，null -> Empty
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Null => RawResult::Empty,
            Value::String(s) => RawResult::Scalar(s),
            Value::Bool(_) | Value::Number(_) => RawResult::Scalar(value.to_string()),
            Value::Array(items) => RawResult::List(items.iter().map(value_text).collect()),
            Value::Object(mut map) => {
                if let Some(collection) = map.remove("tasks_output") {
                    let raw = map.get("raw").map(value_text).filter(|s| !s.is_empty());
                    let items = match collection {
                        Value::Object(entries) => Collection::Map(
                            entries.iter().map(|(k, v)| (k.clone(), value_text(v))).collect(),
                        ),
                        Value::Array(items) => Collection::List(items.iter().map(value_text).collect()),
                        Value::Null => Collection::List(Vec::new()),
                        other => Collection::List(vec![value_text(&other)]),
                    };
                    RawResult::ObjectWithCollection { items, raw }
                } else if let Some(raw) = map.get("raw") {
                    RawResult::ObjectWithRaw(value_text(raw))
                } else {
                    RawResult::Map(map.iter().map(|(k, v)| (k.clone(), value_text(v))).collect())
                }
            }
        }
    }

    /// 标签名（日志用）
    pub fn shape(&self) -> &'static str {
        match self {
            RawResult::List(_) => "list",
            RawResult::Map(_) => "map",
            RawResult::ObjectWithCollection { .. } => "object_with_collection",
            RawResult::ObjectWithRaw(_) => "object_with_raw",
            RawResult::Scalar(_) => "scalar",
            RawResult::Empty => "empty",
        }
    }
}

/// 单项转文本：字符串原样；带 raw / output / result 字段的对象取该字段；null 为空串；其余序列化
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Object(map) => ["raw", "output", "result"]
            .iter()
            .find_map(|k| map.get(*k).filter(|v| !v.is_null()))
            .map(value_text)
            .unwrap_or_else(|| value.to_string()),
        other => other.to_string(),
    }
}

fn write_pairs(f: &mut fmt::Formatter<'_>, pairs: &[(String, String)]) -> fmt::Result {
    let lines: Vec<String> = pairs.iter().map(|(k, v)| format!("{k}: {v}")).collect();
    write!(f, "{}", lines.join("\n\n"))
}

/// 整体字符串化（Normalizer 的最终兜底）
impl fmt::Display for RawResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawResult::List(items) => write!(f, "{}", items.join("\n\n")),
            RawResult::Map(pairs) => write_pairs(f, pairs),
            RawResult::ObjectWithCollection { items, raw } => match (items, raw) {
                (_, Some(raw)) => write!(f, "{raw}"),
                (Collection::List(items), None) => write!(f, "{}", items.join("\n\n")),
                (Collection::Map(pairs), None) => write_pairs(f, pairs),
            },
            RawResult::ObjectWithRaw(text) | RawResult::Scalar(text) => write!(f, "{text}"),
            RawResult::Empty => Ok(()),
        }
    }
}
