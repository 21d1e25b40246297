//! Mock LLM 客户端（离线 / 测试用，无需 API）
//!
//! 从 system 消息中读出角色名，从 user 消息中读出学生问题，按 LlmGateway 的提示约定作答：
//! 开放了白板工具时先回一个 tool call，拿到工具结果后把白板 JSON 放进 ```json 代码块作为最终回答。

use async_trait::async_trait;

use crate::composer::QUESTION_LABEL;
use crate::gateway::llm::{ROLE_PREFIX, TOOL_RESULT_MARKER, FINAL_ANSWER_INSTRUCTION};
use crate::llm::{LlmClient, Message, Role};
use crate::tools::WHITEBOARD_TOOL_NAME;

/// Mock 客户端：确定性地扮演当前角色
#[derive(Debug, Default)]
pub struct MockLlmClient;

impl MockLlmClient {
    fn role_name(messages: &[Message]) -> String {
        messages
            .iter()
            .find(|m| m.role == Role::System)
            .and_then(|m| m.content.strip_prefix(ROLE_PREFIX))
            .and_then(|rest| rest.split('.').next())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "Assistant".to_string())
    }

    fn question(user: &str) -> String {
        user.lines()
            .find_map(|l| l.strip_prefix(QUESTION_LABEL))
            .unwrap_or(user)
            .trim()
            .to_string()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    fn model_name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        let role = Self::role_name(messages);
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");

        if let Some(rest) = last_user.strip_prefix(TOOL_RESULT_MARKER) {
            let observation = rest
                .split_once('\n')
                .map(|(_, body)| body)
                .unwrap_or("")
                .split(FINAL_ANSWER_INSTRUCTION)
                .next()
                .unwrap_or("")
                .trim();
            return Ok(format!(
                "{role} here. I sketched this on the whiteboard so you can follow along.\n\n```json\n{observation}\n```"
            ));
        }

        let question = Self::question(last_user);
        let tools_open = messages
            .iter()
            .any(|m| m.role == Role::System && m.content.contains(WHITEBOARD_TOOL_NAME));
        if tools_open {
            let call = serde_json::json!({
                "tool": WHITEBOARD_TOOL_NAME,
                "args": { "topic": question, "content_type": "graph" }
            });
            return Ok(call.to_string());
        }

        Ok(format!(
            "{role} here. On \"{question}\": let's reason it through one step at a time and check each step against what we already know."
        ))
    }
}
