//! 基于 LlmClient 的执行网关
//!
//! 按顺序逐个运行任务（讨论模式下不允许重叠发言），后面的角色能看到前面角色的发言。
//! 开放工具的任务可以先输出一个 `{"tool": ..., "args": ...}` 调用白板工具，拿到结果后再作答。
//! 工具调用 JSON 无法解析时返回 GatewayError::Format（携带模型原文，供恢复层抢救）。

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::composer::TaskDescriptor;
use crate::core::GatewayError;
use crate::gateway::{Collection, ExecutionGateway, GatewayOutput, RawResult, ToolObservation};
use crate::llm::{LlmClient, Message};
use crate::tools::{tool_call_schema_json, ToolCall, ToolExecutor};

/// system prompt 开头，后接角色显示名
pub const ROLE_PREFIX: &str = "You are the ";
/// 工具结果回灌消息的前缀，后接工具名
pub const TOOL_RESULT_MARKER: &str = "Tool result from ";
pub const FINAL_ANSWER_INSTRUCTION: &str =
    "Now give your final answer to the student. Include the whiteboard JSON above unchanged inside a ```json block, then explain it in plain words.";

const MAX_TOOL_ROUNDS: usize = 2;

/// 一轮模型输出的解析结果
#[derive(Debug)]
pub enum AgentTurn {
    Response(String),
    ToolCall(ToolCall),
}

/// 解析模型输出：```json 块或首尾大括号之间带 "tool" 键的 JSON 视为工具调用，其余为普通回答
pub fn parse_agent_turn(output: &str) -> Result<AgentTurn, GatewayError> {
    let trimmed = output.trim();

    let json_str = if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim())
    } else if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            &trimmed[start..=end]
        } else {
            return Ok(AgentTurn::Response(trimmed.to_string()));
        }
    } else {
        return Ok(AgentTurn::Response(trimmed.to_string()));
    };

    if !json_str.contains("\"tool\"") {
        return Ok(AgentTurn::Response(trimmed.to_string()));
    }

    let parsed: ToolCall = serde_json::from_str(json_str)
        .map_err(|e| GatewayError::Format(format!("Could not parse tool call ({e}): {trimmed}")))?;
    if parsed.tool.trim().is_empty() {
        Ok(AgentTurn::Response(trimmed.to_string()))
    } else {
        Ok(AgentTurn::ToolCall(parsed))
    }
}

pub struct LlmGateway {
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolExecutor>,
}

impl LlmGateway {
    pub fn new(llm: Arc<dyn LlmClient>, tools: Arc<ToolExecutor>) -> Self {
        Self { llm, tools }
    }

    fn system_prompt(&self, task: &TaskDescriptor) -> String {
        let mut prompt = format!(
            "{ROLE_PREFIX}{}. Your goal: {}.\nYou are one of several tutors helping a student. Speak in your own voice and keep it focused.",
            task.role.name, task.role.goal
        );
        if task.tools_enabled && !self.tools.registry().is_empty() {
            prompt.push_str(&format!(
                "\n\nTools you may call (at most once or twice):\n{}\n\nTo call a tool, reply with ONLY one JSON object matching this schema and nothing else:\n{}\nExample: {{\"tool\": \"generate_whiteboard_visual\", \"args\": {{\"topic\": \"y = x^2\", \"content_type\": \"graph\"}}}}",
                self.tools.registry().to_schema_json(),
                tool_call_schema_json()
            ));
        }
        prompt
    }

    async fn complete(
        &self,
        messages: &[Message],
        cancel: &CancellationToken,
    ) -> Result<String, GatewayError> {
        tokio::select! {
            reply = self.llm.complete(messages) => reply.map_err(GatewayError::Transport),
            _ = cancel.cancelled() => Err(GatewayError::Cancelled),
        }
    }

    async fn run_task(
        &self,
        task: &TaskDescriptor,
        transcript: &[(String, String)],
        cancel: &CancellationToken,
        observations: &mut Vec<ToolObservation>,
    ) -> Result<String, GatewayError> {
        let mut user = task.prompt.clone();
        if !transcript.is_empty() {
            user.push_str("\n\nDiscussion so far:\n");
            for (speaker, text) in transcript {
                user.push_str(&format!("{speaker}: {text}\n"));
            }
        }
        let mut messages = vec![Message::system(self.system_prompt(task)), Message::user(user)];

        let mut rounds_left = if task.tools_enabled { MAX_TOOL_ROUNDS } else { 0 };
        loop {
            let reply = self.complete(&messages, cancel).await?;
            if rounds_left == 0 {
                return Ok(reply);
            }
            match parse_agent_turn(&reply)? {
                AgentTurn::Response(text) => return Ok(text),
                AgentTurn::ToolCall(call) => {
                    rounds_left -= 1;
                    let result = tokio::select! {
                        r = self.tools.execute(&call.tool, call.args.clone()) => r,
                        _ = cancel.cancelled() => return Err(GatewayError::Cancelled),
                    };
                    let output = match result {
                        Ok(out) => out,
                        Err(e) => format!("Error: {e}"),
                    };
                    tracing::debug!(role = %task.role.name, tool = %call.tool, "tool observation");
                    observations.push(ToolObservation {
                        tool: call.tool.clone(),
                        output: output.clone(),
                    });
                    messages.push(Message::assistant(reply));
                    messages.push(Message::user(format!(
                        "{TOOL_RESULT_MARKER}{}:\n{output}\n\n{FINAL_ANSWER_INSTRUCTION}",
                        call.tool
                    )));
                }
            }
        }
    }

    async fn run(
        &self,
        tasks: &[TaskDescriptor],
        cancel: &CancellationToken,
    ) -> Result<GatewayOutput, GatewayError> {
        let mut outputs = Vec::with_capacity(tasks.len());
        let mut transcript: Vec<(String, String)> = Vec::new();
        let mut observations = Vec::new();

        for task in tasks {
            if cancel.is_cancelled() {
                return Err(GatewayError::Cancelled);
            }
            let text = self.run_task(task, &transcript, cancel, &mut observations).await?;
            tracing::info!(
                role = %task.role.name,
                model = self.llm.model_name(),
                chars = text.chars().count(),
                "agent turn finished"
            );
            transcript.push((task.role.name.clone(), text.clone()));
            outputs.push(text);
        }

        let raw = outputs.last().cloned();
        Ok(GatewayOutput {
            task_outputs: outputs.iter().cloned().map(Some).collect(),
            result: RawResult::ObjectWithCollection {
                items: Collection::List(outputs),
                raw,
            },
            answer: None,
            tool_observations: observations,
        })
    }
}

impl ExecutionGateway for LlmGateway {
    /// 在 blocking worker 上调用：借当前 runtime 的 Handle 驱动异步 LLM 请求
    fn execute(
        &self,
        tasks: &[TaskDescriptor],
        cancel: &CancellationToken,
    ) -> Result<GatewayOutput, GatewayError> {
        let handle = Handle::try_current().map_err(|e| GatewayError::Worker(e.to_string()))?;
        handle.block_on(self.run(tasks, cancel))
    }
}
