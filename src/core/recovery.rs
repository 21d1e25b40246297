//! 错误恢复引擎
//!
//! 包裹执行网关调用的失败：Format / Timeout 先尝试从错误文本中抢救推理片段，
//! 抢救不到则降级为固定的道歉提示；其余错误原样上报，不在本地重试。

use crate::core::{GatewayError, RecoveryAction};
use crate::result::{AgentMessage, ASSISTANT_ROLE};

const THOUGHT_MARKER: &str = "thought:";
const ACTION_MARKERS: [&str; 2] = ["action:", "action input:"];

/// 语义化错误恢复：将网关错误映射为可执行动作
#[derive(Debug, Clone)]
pub struct RecoveryEngine {
    salvage_min_chars: usize,
}

impl Default for RecoveryEngine {
    fn default() -> Self {
        Self::new(40)
    }
}

impl RecoveryEngine {
    pub fn new(salvage_min_chars: usize) -> Self {
        Self {
            salvage_min_chars: salvage_min_chars.max(1),
        }
    }

    pub fn handle(&self, err: &GatewayError) -> RecoveryAction {
        match err {
            GatewayError::Format(message) => match self.salvage(message) {
                Some(text) => {
                    tracing::warn!(chars = text.chars().count(), "format error, salvaged reasoning fragment");
                    RecoveryAction::Salvage(AgentMessage::new(ASSISTANT_ROLE, text))
                }
                None => {
                    tracing::warn!("format error, nothing to salvage");
                    RecoveryAction::Apologize
                }
            },
            // 超时没有错误文本可抢救，等同于无片段的格式错误
            GatewayError::Timeout(limit) => {
                tracing::warn!(?limit, "gateway timed out");
                RecoveryAction::Apologize
            }
            GatewayError::Transport(detail) | GatewayError::Worker(detail) => {
                RecoveryAction::Surface(detail.clone())
            }
            GatewayError::Cancelled => RecoveryAction::Surface(err.to_string()),
        }
    }

    /// 在错误文本中查找 `Thought:` 开头的推理片段，止于空行或 Action 标记；
    /// 依次尝试每个标记出现处，返回第一个长度达标的片段
    pub fn salvage(&self, message: &str) -> Option<String> {
        let lower = message.to_ascii_lowercase();
        let mut from = 0;
        while let Some(pos) = lower[from..].find(THOUGHT_MARKER) {
            let start = from + pos + THOUGHT_MARKER.len();
            let rest = &message[start..];
            let end = fragment_end(&lower[start..]);
            let fragment = rest[..end].trim_matches(|c: char| {
                c.is_whitespace() || c == '`' || c == '\'' || c == '"'
            });
            if fragment.chars().count() >= self.salvage_min_chars {
                return Some(fragment.to_string());
            }
            from = start;
        }
        None
    }
}

/// 片段结束位置：第一个空行、Action 标记或下一个 Thought 标记（已小写的文本）
fn fragment_end(lower: &str) -> usize {
    let blank = blank_line_at(lower);
    let action = ACTION_MARKERS.iter().filter_map(|m| lower.find(m)).min();
    let next_thought = lower.find(THOUGHT_MARKER);
    [blank, action, next_thought]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(lower.len())
}

fn blank_line_at(s: &str) -> Option<usize> {
    s.match_indices('\n').map(|(i, _)| i).find(|&i| {
        let next = &s[i + 1..];
        let line = next.split('\n').next().unwrap_or("");
        line.trim().is_empty() && next.contains('\n')
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const LONG_THOUGHT: &str = "The roots of x^2 - 5x + 6 are found by factoring into (x - 2)(x - 3), so x = 2 or x = 3.";

    #[test]
    fn test_salvage_from_format_error() {
        let engine = RecoveryEngine::new(40);
        let err = GatewayError::Format(format!(
            "Could not parse LLM output: `Thought: {LONG_THOUGHT}\nAction: the_tool\nAction Input: {{}}`"
        ));
        match engine.handle(&err) {
            RecoveryAction::Salvage(msg) => {
                assert_eq!(msg.role, ASSISTANT_ROLE);
                assert_eq!(msg.text, LONG_THOUGHT);
            }
            other => panic!("Expected Salvage, got {other:?}"),
        }
    }

    #[test]
    fn test_salvage_stops_at_blank_line() {
        let engine = RecoveryEngine::new(20);
        let text = format!("thought: {LONG_THOUGHT}\n  \nsome trailing noise that is not part of it");
        assert_eq!(engine.salvage(&text).as_deref(), Some(LONG_THOUGHT));
    }

    #[test]
    fn test_short_fragment_skipped_for_later_marker() {
        let engine = RecoveryEngine::new(40);
        let text = format!("I missed the 'Action:' after 'Thought:'. Output was:\nThought: {LONG_THOUGHT}");
        assert_eq!(engine.salvage(&text).as_deref(), Some(LONG_THOUGHT));
    }

    #[test]
    fn test_format_error_without_fragment_apologizes() {
        let engine = RecoveryEngine::new(40);
        let err = GatewayError::Format("Invalid Format: missing Action".to_string());
        assert_eq!(engine.handle(&err), RecoveryAction::Apologize);
    }

    #[test]
    fn test_timeout_apologizes() {
        let engine = RecoveryEngine::default();
        let err = GatewayError::Timeout(Duration::from_secs(300));
        assert_eq!(engine.handle(&err), RecoveryAction::Apologize);
    }

    #[test]
    fn test_transport_error_surfaces_detail() {
        let engine = RecoveryEngine::default();
        let err = GatewayError::Transport("connection refused".to_string());
        assert_eq!(
            engine.handle(&err),
            RecoveryAction::Surface("connection refused".to_string())
        );
        assert!(!err.is_recoverable());
    }
}
