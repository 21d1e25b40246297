//! 结果层：把网关的异构输出规整成稳定的 StudyHelpResult
//!
//! - **normalizer**: RawResult -> 有序、去重的 AgentMessage 列表
//! - **answer**: 按固定优先级选出主回答
//! - **whiteboard**: 从回答文本与工具观察中定位白板载荷
//! - **braces**: 围栏与平衡大括号扫描器

pub mod answer;
pub mod braces;
pub mod normalizer;
pub mod whiteboard;

use serde::{Deserialize, Serialize};

pub use answer::select_main_answer;
pub use normalizer::{is_meaningful, normalize};
pub use whiteboard::{
    extract_whiteboard, scan_text, strip_payload, PayloadOrigin, RenderEngine, WhiteboardKind,
    WhiteboardMatch, WhiteboardSpec,
};

/// 无法对应到任务时使用的角色名
pub const FALLBACK_ROLE: &str = "Agent";
/// 从格式错误中抢救出的回答使用的角色名
pub const ASSISTANT_ROLE: &str = "Assistant";

pub const NO_ANSWER_PLACEHOLDER: &str =
    "I couldn't put together an answer this time. Please try asking again.";
pub const REPHRASE_MESSAGE: &str =
    "I had trouble formatting my response. Could you please rephrase your question?";
pub const FORMAT_ERROR: &str = "format parsing error";
pub const NO_RESPONDER_MESSAGE: &str =
    "No tutor is available to answer right now. Please try again when someone joins the session.";

/// 一条角色发言；text 非空且不是占位符
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMessage {
    #[serde(rename = "agent")]
    pub role: String,
    #[serde(rename = "message")]
    pub text: String,
}

impl AgentMessage {
    pub fn new(role: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            text: text.into(),
        }
    }
}

/// 管线的最终输出，序列化给调用方
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyHelpResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub agent_responses: Vec<AgentMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whiteboard: Option<WhiteboardSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time_seconds: Option<f64>,
}

impl StudyHelpResult {
    pub fn answered(
        answer: String,
        agent_responses: Vec<AgentMessage>,
        whiteboard: Option<WhiteboardSpec>,
    ) -> Self {
        Self {
            success: true,
            answer: Some(answer),
            agent_responses,
            whiteboard,
            error: None,
            execution_time_seconds: None,
        }
    }

    /// 目录为空：不是错误，返回「无人应答」
    pub fn no_responder() -> Self {
        Self::answered(NO_RESPONDER_MESSAGE.to_string(), Vec::new(), None)
    }

    /// 抢救出的单条回答
    pub fn salvaged(message: AgentMessage) -> Self {
        Self::answered(message.text.clone(), vec![message], None)
    }

    /// 格式错误且无可抢救内容
    pub fn rephrase() -> Self {
        Self {
            success: false,
            answer: Some(REPHRASE_MESSAGE.to_string()),
            agent_responses: Vec::new(),
            whiteboard: None,
            error: Some(FORMAT_ERROR.to_string()),
            execution_time_seconds: None,
        }
    }

    /// 不可恢复的错误：原样带出细节
    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            success: false,
            answer: None,
            agent_responses: Vec::new(),
            whiteboard: None,
            error: Some(detail.into()),
            execution_time_seconds: None,
        }
    }

    pub fn with_execution_time(mut self, secs: f64) -> Self {
        self.execution_time_seconds = Some((secs * 1000.0).round() / 1000.0);
        self
    }
}
