//! 网关错误类型与恢复动作
//!
//! 与 RecoveryEngine 配合：根据 GatewayError 决定 Salvage / Apologize / Surface。

use std::time::Duration;

use thiserror::Error;

use crate::result::AgentMessage;

/// 执行网关调用过程中可能出现的错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    /// 上游推理循环产出了无法解析的动作；消息体可能带有可抢救的推理片段
    #[error("Format error: {0}")]
    Format(String),

    /// 网络 / 基础设施故障，不在本地恢复
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Gateway timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Execution cancelled")]
    Cancelled,

    /// worker 线程 panic 或被中止
    #[error("Worker failed: {0}")]
    Worker(String),
}

impl GatewayError {
    /// Format 与 Timeout 走可恢复路径，其余直接上报
    pub fn is_recoverable(&self) -> bool {
        matches!(self, GatewayError::Format(_) | GatewayError::Timeout(_))
    }
}

/// 工具调用错误（由 ToolExecutor 产出，LlmGateway 转为 GatewayError）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Tool execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    Timeout(String),
}

/// 恢复引擎根据错误类型给出的动作
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryAction {
    /// 从错误文本中抢救出的单条回答，按成功返回
    Salvage(AgentMessage),
    /// 没有可抢救内容：返回固定的「请换个说法」提示
    Apologize,
    /// 不可恢复：原样上报错误细节
    Surface(String),
}
