//! Whiteboard Payload Extractor
//!
//! 按规范顺序逐段扫描文本（先所有发言，再名称含 "whiteboard" 的工具观察，再其余观察），
//! 每段文本依次尝试：
//! 1. 整段解析为 JSON 对象，含 type 或 render_engine 即接受
//! 2. ```json 代码块，同样的接受条件
//! 3. 无标记的 ``` 代码块，同样的接受条件
//! 4. 平衡大括号片段（扁平对象优先），含 type、specifications 或 instructions 即接受；
//!    内层对象被另一个可接受片段包住时让位给外层
//!
//! 第一个命中即停止。返回载荷本身与其在原文中的片段，调用方据此把 JSON 从正文中剥离。

use std::collections::BTreeMap;
use std::ops::Range;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::gateway::ToolObservation;
use crate::result::braces::{brace_candidates, fenced_blocks};
use crate::result::{is_meaningful, AgentMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WhiteboardKind {
    Graph,
    Diagram,
    ConceptMap,
    StepByStep,
    Other,
}

impl WhiteboardKind {
    fn parse(tag: &str) -> Self {
        match tag.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "graph" | "equation" | "function" | "plot" => WhiteboardKind::Graph,
            "diagram" | "flowchart" => WhiteboardKind::Diagram,
            "concept_map" | "mind_map" => WhiteboardKind::ConceptMap,
            "step_by_step" | "steps" => WhiteboardKind::StepByStep,
            _ => WhiteboardKind::Other,
        }
    }

    fn verb(self) -> &'static str {
        match self {
            WhiteboardKind::Graph => "Plot",
            WhiteboardKind::Diagram => "Draw",
            WhiteboardKind::ConceptMap => "Map out",
            WhiteboardKind::StepByStep => "Walk through",
            WhiteboardKind::Other => "Sketch",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderEngine {
    Whiteboard,
    Desmos,
}

/// 一份白板可视化描述；desmos 引擎时 expression 必定存在
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WhiteboardSpec {
    #[serde(rename = "type")]
    pub kind: WhiteboardKind,
    pub render_engine: RenderEngine,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    pub instructions: String,
    pub specifications: BTreeMap<String, String>,
    /// 一两句话的展示摘要
    pub summary: String,
}

impl WhiteboardSpec {
    /// 从 JSON 对象构造；render_engine 为 desmos 但缺少表达式时降级为 whiteboard
    pub fn from_object(obj: &Map<String, Value>) -> Self {
        let kind = obj
            .get("type")
            .and_then(Value::as_str)
            .map(WhiteboardKind::parse)
            .unwrap_or(WhiteboardKind::Other);

        let expression = obj
            .get("expression")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(String::from);

        let wants_desmos = engine_tag(obj)
            .map(|e| e.eq_ignore_ascii_case("desmos"))
            .unwrap_or(false);
        let render_engine = if wants_desmos && expression.is_some() {
            RenderEngine::Desmos
        } else {
            RenderEngine::Whiteboard
        };

        let instructions = ["instructions", "description"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_str))
            .unwrap_or("")
            .trim()
            .to_string();

        let specifications = match obj.get("specifications") {
            Some(Value::Object(map)) => map
                .iter()
                .map(|(k, v)| (k.clone(), scalar_text(v)))
                .collect(),
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (format!("item_{}", i + 1), scalar_text(v)))
                .collect(),
            Some(Value::String(s)) if !s.trim().is_empty() => {
                BTreeMap::from([("details".to_string(), s.trim().to_string())])
            }
            _ => BTreeMap::new(),
        };

        let mut spec = Self {
            kind,
            render_engine,
            expression,
            instructions,
            specifications,
            summary: String::new(),
        };
        spec.summary = spec.summarize(obj.get("description").and_then(Value::as_str));
        spec
    }

    /// 动词 + 对象 + 渲染位置，必要时追加要素清单
    fn summarize(&self, description: Option<&str>) -> String {
        let place = match self.render_engine {
            RenderEngine::Desmos => "the Desmos graphing calculator",
            RenderEngine::Whiteboard => "the whiteboard",
        };
        let subject = self.expression.clone().or_else(|| {
            description
                .and_then(|d| d.rsplit_once(": ").map(|(_, s)| s.trim().to_string()))
                .filter(|s| !s.is_empty())
        });
        // 没有明确对象时，指令首句本身就是动作描述
        let action = match subject {
            Some(subject) => format!("{} {}", self.kind.verb(), subject.trim_end_matches('.')),
            None => self
                .instructions
                .split('.')
                .next()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .unwrap_or_else(|| format!("{} the concept", self.kind.verb())),
        };
        let mut summary = format!("{action} on {place}.");
        if !self.specifications.is_empty() {
            let keys: Vec<&str> = self.specifications.keys().map(|k| k.as_str()).collect();
            summary.push_str(&format!(" Key elements: {}.", keys.join(", ")));
        }
        summary
    }
}

fn engine_tag(obj: &Map<String, Value>) -> Option<&str> {
    obj.get("render_engine")
        .or_else(|| obj.get("renderEngine"))
        .and_then(Value::as_str)
}

fn scalar_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// 任一白板键存在即视为载荷
pub fn looks_like_payload(obj: &Map<String, Value>) -> bool {
    obj.contains_key("type")
        || engine_tag(obj).is_some()
        || obj.contains_key("specifications")
        || obj.contains_key("instructions")
}

/// 策略 1-3 的接受条件：类型标记或渲染引擎标记
fn has_type_or_engine(obj: &Map<String, Value>) -> bool {
    obj.contains_key("type") || engine_tag(obj).is_some()
}

/// 策略 4 的接受条件
fn has_type_or_spec_keys(obj: &Map<String, Value>) -> bool {
    obj.contains_key("type") || obj.contains_key("specifications") || obj.contains_key("instructions")
}

fn parse_object(text: &str, accept: fn(&Map<String, Value>) -> bool) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(Value::Object(obj)) if accept(&obj) && looks_like_payload(&obj) => Some(obj),
        _ => None,
    }
}

/// 载荷出处
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadOrigin {
    /// 发言下标
    Message(usize),
    /// 工具观察下标
    Observation(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhiteboardMatch {
    pub spec: WhiteboardSpec,
    /// 原文中被识别为载荷的片段（整段、代码块或大括号片段）
    pub source: String,
    pub origin: PayloadOrigin,
}

/// 在单段文本中查找载荷，返回 (载荷, 原文片段)
pub fn scan_text(text: &str) -> Option<(WhiteboardSpec, String)> {
    if let Some(obj) = parse_object(text, has_type_or_engine) {
        return Some((WhiteboardSpec::from_object(&obj), text.trim().to_string()));
    }

    let blocks = fenced_blocks(text);
    let tagged = blocks.iter().filter(|b| b.tag.eq_ignore_ascii_case("json"));
    let untagged = blocks.iter().filter(|b| b.tag.is_empty());
    for block in tagged.chain(untagged) {
        if let Some(obj) = parse_object(block.body, has_type_or_engine) {
            return Some((WhiteboardSpec::from_object(&obj), text[block.span.clone()].to_string()));
        }
    }

    // 被另一个可接受片段包住的内层对象不单独成立
    let accepted: Vec<(Range<usize>, Map<String, Value>)> = brace_candidates(text)
        .into_iter()
        .filter_map(|span| {
            parse_object(&text[span.clone()], has_type_or_spec_keys).map(|obj| (span, obj))
        })
        .collect();
    let enclosed = |span: &Range<usize>| {
        accepted
            .iter()
            .any(|(outer, _)| outer != span && outer.start <= span.start && span.end <= outer.end)
    };
    accepted
        .iter()
        .find(|(span, _)| !enclosed(span))
        .map(|(span, obj)| (WhiteboardSpec::from_object(obj), text[span.clone()].to_string()))
}

/// 扫描发言与工具观察，返回第一个命中的载荷
pub fn extract_whiteboard(
    messages: &[AgentMessage],
    observations: &[ToolObservation],
) -> Option<WhiteboardMatch> {
    let is_whiteboard = |o: &ToolObservation| o.tool.to_lowercase().contains("whiteboard");
    let message_texts = messages
        .iter()
        .enumerate()
        .map(|(i, m)| (PayloadOrigin::Message(i), m.text.as_str()));
    let whiteboard_obs = observations
        .iter()
        .enumerate()
        .filter(|(_, o)| is_whiteboard(*o))
        .map(|(i, o)| (PayloadOrigin::Observation(i), o.output.as_str()));
    let other_obs = observations
        .iter()
        .enumerate()
        .filter(|(_, o)| !is_whiteboard(*o))
        .map(|(i, o)| (PayloadOrigin::Observation(i), o.output.as_str()));

    message_texts
        .chain(whiteboard_obs)
        .chain(other_obs)
        .find_map(|(origin, text)| {
            scan_text(text).map(|(spec, source)| WhiteboardMatch { spec, source, origin })
        })
}

/// 从正文中剥离载荷片段；剥离后无内容时返回 None（调用方保留原文）
pub fn strip_payload(text: &str, source: &str) -> Option<String> {
    if source.is_empty() || !text.contains(source) {
        return None;
    }
    let stripped = text.replacen(source, "", 1);
    let mut out = String::with_capacity(stripped.len());
    let mut blank_run = 0;
    for line in stripped.trim().lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    let out = out.trim().to_string();
    is_meaningful(&out).then_some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRAPH_JSON: &str = r#"{"type": "graph", "expression": "y = x^2 - 5x + 6", "render_engine": "desmos", "specifications": {"axes": "label x and y", "roots": "mark x = 2 and x = 3"}, "instructions": "Plot the parabola."}"#;

    #[test]
    fn test_whole_text_payload() {
        let (spec, source) = scan_text(GRAPH_JSON).unwrap();
        assert_eq!(spec.kind, WhiteboardKind::Graph);
        assert_eq!(spec.render_engine, RenderEngine::Desmos);
        assert_eq!(spec.expression.as_deref(), Some("y = x^2 - 5x + 6"));
        assert_eq!(source, GRAPH_JSON);
        assert_eq!(
            spec.summary,
            "Plot y = x^2 - 5x + 6 on the Desmos graphing calculator. Key elements: axes, roots."
        );
    }

    #[test]
    fn test_tagged_fence_in_prose() {
        let text = format!("Here is the picture:\n```json\n{GRAPH_JSON}\n```\nThe roots are 2 and 3.");
        let (spec, source) = scan_text(&text).unwrap();
        assert_eq!(spec.kind, WhiteboardKind::Graph);
        assert!(source.starts_with("```json"));
        assert_eq!(
            strip_payload(&text, &source).as_deref(),
            Some("Here is the picture:\n\nThe roots are 2 and 3.")
        );
    }

    #[test]
    fn test_untagged_fence_and_desmos_downgrade() {
        let text = "Look:\n```\n{\"type\": \"diagram\", \"render_engine\": \"desmos\", \"description\": \"Diagram visualization for: the heart\"}\n```";
        let (spec, _) = scan_text(text).unwrap();
        assert_eq!(spec.kind, WhiteboardKind::Diagram);
        assert_eq!(spec.render_engine, RenderEngine::Whiteboard);
        assert!(spec.expression.is_none());
        assert_eq!(spec.instructions, "Diagram visualization for: the heart");
        assert_eq!(spec.summary, "Draw the heart on the whiteboard.");
    }

    #[test]
    fn test_brace_scan_prefers_flat_objects() {
        let text = "We can draw it {\"instructions\": \"Draw the water cycle with arrows\"} and also note {\"x\": 1}.";
        let (spec, source) = scan_text(text).unwrap();
        assert_eq!(spec.kind, WhiteboardKind::Other);
        assert_eq!(source, "{\"instructions\": \"Draw the water cycle with arrows\"}");
        assert_eq!(spec.summary, "Draw the water cycle with arrows on the whiteboard.");
    }

    #[test]
    fn test_no_payload_is_none_and_deterministic() {
        let text = "Set notation like {1, 2, 3} is not a picture. Neither is {\"x\": 1}.";
        assert!(scan_text(text).is_none());
        assert!(scan_text(text).is_none());
        assert!(extract_whiteboard(&[AgentMessage::new("A", text)], &[]).is_none());
    }

    #[test]
    fn test_observation_order() {
        let messages = vec![AgentMessage::new("A", "no visual here")];
        let observations = vec![
            ToolObservation {
                tool: "calculator".into(),
                output: "{\"type\": \"other\"}".into(),
            },
            ToolObservation {
                tool: "generate_whiteboard_visual".into(),
                output: GRAPH_JSON.into(),
            },
        ];
        let m = extract_whiteboard(&messages, &observations).unwrap();
        assert_eq!(m.origin, PayloadOrigin::Observation(1));
        assert_eq!(m.spec.kind, WhiteboardKind::Graph);
    }

    #[test]
    fn test_messages_scanned_before_observations() {
        let messages = vec![
            AgentMessage::new("A", "plain"),
            AgentMessage::new("B", format!("```json\n{GRAPH_JSON}\n```")),
        ];
        let observations = vec![ToolObservation {
            tool: "generate_whiteboard_visual".into(),
            output: "{\"type\": \"diagram\"}".into(),
        }];
        let m = extract_whiteboard(&messages, &observations).unwrap();
        assert_eq!(m.origin, PayloadOrigin::Message(1));
    }

    #[test]
    fn test_strip_keeps_original_when_nothing_left() {
        assert!(strip_payload(GRAPH_JSON, GRAPH_JSON).is_none());
        assert!(strip_payload("prose", "missing").is_none());
    }

    #[test]
    fn test_serialized_shape() {
        let (spec, _) = scan_text(GRAPH_JSON).unwrap();
        let v = serde_json::to_value(&spec).unwrap();
        assert_eq!(v["type"], "graph");
        assert_eq!(v["renderEngine"], "desmos");
        assert_eq!(v["specifications"]["roots"], "mark x = 2 and x = 3");
    }

    #[test]
    fn test_outer_payload_wins_over_inner_typed_object() {
        let payload = r#"{"type":"diagram","specifications":{"nodes":{"type":"circle"}},"instructions":"Draw the cell."}"#;
        let text = format!("Here is the layout: {payload} Label each part.");
        let (spec, source) = scan_text(&text).unwrap();
        assert_eq!(source, payload);
        assert_eq!(spec.kind, WhiteboardKind::Diagram);
        assert_eq!(
            strip_payload(&text, &source).as_deref(),
            Some("Here is the layout:  Label each part.")
        );
    }
}
