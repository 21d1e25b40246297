//! 白板可视化工具
//!
//! Agent 在讲解需要配图的概念时调用，返回一段结构化 JSON（type / description / specifications /
//! instructions / render_engine / expression / desmos），由下游 Whiteboard Payload Extractor 从回答中取出。

use async_trait::async_trait;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};

use crate::tools::Tool;

pub const WHITEBOARD_TOOL_NAME: &str = "generate_whiteboard_visual";
pub const WHITEBOARD_FLEX_TOOL_NAME: &str = "generate_whiteboard_visual_flex";

/// 白板工具参数
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct WhiteboardArgs {
    /// 需要可视化的概念、方程或主题，越具体越好（如 "quadratic equation x^2 - 5x + 6"）
    pub topic: String,
    /// 可视化类型：graph / diagram / equation / concept_map / step_by_step，默认 graph
    #[serde(default = "default_content_type")]
    pub content_type: String,
    /// 为什么需要这张图、要突出哪些要素
    #[serde(default)]
    pub context: String,
    /// 为 true 时输出 Desmos 渲染标记与表达式
    #[serde(default, deserialize_with = "lenient_bool")]
    #[schemars(with = "bool")]
    pub desmos: bool,
}

fn default_content_type() -> String {
    "graph".to_string()
}

/// 接受 true/false、"yes"/"1" 之类的字符串与数字
fn lenient_bool<'de, D: Deserializer<'de>>(de: D) -> Result<bool, D::Error> {
    Ok(truthy(&Value::deserialize(de)?))
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "y"),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => false,
    }
}

impl WhiteboardArgs {
    /// topic 本身是整段 JSON 时（模型把参数塞进了 topic），用其中的字段覆盖
    fn unfold_topic(mut self) -> Self {
        let inner = self.topic.trim();
        if !inner.starts_with('{') {
            return self;
        }
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(inner) {
            if let Some(Value::String(t)) = map.get("topic") {
                self.topic = t.clone();
            }
            if let Some(Value::String(c)) = map.get("content_type") {
                self.content_type = c.clone();
            }
            if let Some(Value::String(c)) = map.get("context") {
                self.context = c.clone();
            }
            if let Some(d) = map.get("desmos") {
                self.desmos = truthy(d);
            }
        }
        self
    }
}

/// 按类型生成可视化描述
pub fn render_visual(args: &WhiteboardArgs) -> Value {
    let topic = args.topic.trim();
    let kind = args.content_type.trim();
    let or_default = |fallback: &str| {
        if args.context.trim().is_empty() {
            fallback.to_string()
        } else {
            args.context.trim().to_string()
        }
    };

    let mut spec = match kind {
        "graph" => json!({
            "type": "graph",
            "description": format!("Graph visualization for: {topic}"),
            "specifications": {
                "axes": "Include x and y axes with appropriate labels",
                "grid": "Show grid lines for reference",
                "annotations": "Mark key points (intercepts, roots, turning points) clearly",
            },
            "instructions": format!(
                "Create a graph that visually represents {topic}. {}",
                or_default("Highlight important features and relationships.")
            ),
        }),
        "diagram" => json!({
            "type": "diagram",
            "description": format!("Diagram visualization for: {topic}"),
            "specifications": {
                "components": "Identify all key components and their relationships",
                "labels": "Label all important parts clearly",
                "flow": "Show direction/flow if applicable",
            },
            "instructions": format!(
                "Create a diagram showing {topic}. {}",
                or_default("Use clear visual hierarchy and connections.")
            ),
        }),
        "concept_map" => json!({
            "type": "concept_map",
            "description": format!("Concept map for: {topic}"),
            "specifications": {
                "nodes": "Identify key concepts as nodes",
                "connections": "Show relationships between concepts with labeled edges",
                "hierarchy": "Organize concepts by importance or category",
            },
            "instructions": format!(
                "Create a concept map for {topic}. {}",
                or_default("Show relationships and connections clearly.")
            ),
        }),
        "step_by_step" => json!({
            "type": "step_by_step",
            "description": format!("Step-by-step visual solution for: {topic}"),
            "specifications": {
                "steps": "Break down into numbered steps",
                "annotations": "Add visual annotations to each step",
                "highlight": "Highlight important operations or transformations",
            },
            "instructions": format!(
                "Create a step-by-step visual solution for {topic}. {}",
                or_default("Make each step clear and visually distinct.")
            ),
        }),
        other => json!({
            "type": other,
            "description": format!("Visual representation for: {topic}"),
            "specifications": {
                "elements": "Include all relevant visual elements",
                "labels": "Add clear labels and annotations",
            },
            "instructions": format!(
                "Create a {other} visualization for {topic}. {}",
                or_default("Make it clear and educational.")
            ),
        }),
    };

    let use_desmos = args.desmos && matches!(kind, "graph" | "equation");
    if let Value::Object(map) = &mut spec {
        if use_desmos {
            map.insert("render_engine".into(), json!("desmos"));
            map.insert("expression".into(), json!(topic));
        } else {
            map.insert("render_engine".into(), json!("whiteboard"));
            map.insert("expression".into(), Value::Null);
        }
        map.insert("desmos".into(), json!(use_desmos));
    }
    spec
}

/// generate_whiteboard_visual
#[derive(Debug, Default)]
pub struct WhiteboardTool;

#[async_trait]
impl Tool for WhiteboardTool {
    fn name(&self) -> &str {
        WHITEBOARD_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Generate a structured description of a graph, diagram, concept map or step-by-step visual \
         to show on the whiteboard. Use it only when a visual significantly aids understanding, \
         e.g. graphs of equations, scientific processes, or relationships between concepts."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::to_value(schema_for!(WhiteboardArgs)).unwrap_or_else(|_| json!({}))
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let args = match args {
            // 模型有时把整个参数对象当字符串传进来
            Value::String(s) => return WhiteboardFlexTool.run_payload(&s),
            other => serde_json::from_value::<WhiteboardArgs>(other)
                .map_err(|e| format!("invalid whiteboard args: {e}"))?
                .unfold_topic(),
        };
        serde_json::to_string_pretty(&render_visual(&args)).map_err(|e| e.to_string())
    }
}

/// generate_whiteboard_visual_flex：只接收一个 payload 字符串
#[derive(Debug, Default)]
pub struct WhiteboardFlexTool;

impl WhiteboardFlexTool {
    /// payload 为 JSON 对象时按完整参数处理；否则视为表达式，按 Desmos 图像处理
    fn run_payload(&self, payload: &str) -> Result<String, String> {
        let trimmed = payload.trim();
        let parsed = if trimmed.starts_with('{') {
            serde_json::from_str::<WhiteboardArgs>(trimmed).ok()
        } else {
            None
        };
        let args = parsed.unwrap_or_else(|| WhiteboardArgs {
            topic: trimmed.to_string(),
            content_type: default_content_type(),
            context: String::new(),
            desmos: true,
        });
        serde_json::to_string_pretty(&render_visual(&args)).map_err(|e| e.to_string())
    }
}

#[async_trait]
impl Tool for WhiteboardFlexTool {
    fn name(&self) -> &str {
        WHITEBOARD_FLEX_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Flexible wrapper for generate_whiteboard_visual. Takes a single 'payload' string: either a \
         JSON object with topic, content_type, context, desmos, or a plain expression such as 'y = x^2 - 5x + 6'."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "payload": { "type": "string" } },
            "required": ["payload"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let payload = match &args {
            Value::String(s) => s.clone(),
            Value::Object(map) => match map.get("payload") {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => args.to_string(),
            },
            other => other.to_string(),
        };
        self.run_payload(&payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_graph_with_desmos() {
        let out = WhiteboardTool
            .execute(json!({"topic": "y = x^2 - 5x + 6", "desmos": "yes"}))
            .await
            .unwrap();
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["type"], "graph");
        assert_eq!(v["render_engine"], "desmos");
        assert_eq!(v["expression"], "y = x^2 - 5x + 6");
        assert_eq!(v["desmos"], true);
        assert!(v["specifications"]["axes"].is_string());
    }

    #[tokio::test]
    async fn test_diagram_ignores_desmos_flag() {
        let out = WhiteboardTool
            .execute(json!({"topic": "photosynthesis", "content_type": "diagram", "desmos": true, "context": "Show inputs and outputs."}))
            .await
            .unwrap();
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["type"], "diagram");
        assert_eq!(v["render_engine"], "whiteboard");
        assert!(v["expression"].is_null());
        assert_eq!(v["instructions"], "Create a diagram showing photosynthesis. Show inputs and outputs.");
    }

    #[tokio::test]
    async fn test_topic_carrying_whole_payload() {
        let out = WhiteboardTool
            .execute(json!({"topic": "{\"topic\": \"water cycle\", \"content_type\": \"concept_map\"}"}))
            .await
            .unwrap();
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["type"], "concept_map");
        assert_eq!(v["description"], "Concept map for: water cycle");
    }

    #[tokio::test]
    async fn test_flex_plain_expression() {
        let out = WhiteboardFlexTool
            .execute(json!({"payload": "y = 2x + 1"}))
            .await
            .unwrap();
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["render_engine"], "desmos");
        assert_eq!(v["expression"], "y = 2x + 1");
    }

    #[tokio::test]
    async fn test_missing_topic_is_error() {
        assert!(WhiteboardTool.execute(json!({"content_type": "graph"})).await.is_err());
    }
}
