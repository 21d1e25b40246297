//! 执行网关（Execution Gateway）
//!
//! 外部多 Agent 推理引擎的边界：接收有序任务列表，同步阻塞地返回 `GatewayOutput`。
//! 调用方（ExecutionPool）负责把调用放到 blocking worker 上并施加外部超时；实现需要定期检查取消 token。

pub mod llm;
pub mod mock;
pub mod raw;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::composer::TaskDescriptor;
use crate::core::GatewayError;

pub use llm::LlmGateway;
pub use mock::ScriptedGateway;
pub use raw::{Collection, RawResult};

/// 一次工具调用的观察结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolObservation {
    pub tool: String,
    pub output: String,
}

/// 网关的完整返回：聚合结果 + 任务级输出 + 单独报告的 answer + 工具观察
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GatewayOutput {
    pub result: RawResult,
    /// 与任务按位置对应；引擎把结果挂在任务对象上时填写
    pub task_outputs: Vec<Option<String>>,
    pub answer: Option<String>,
    pub tool_observations: Vec<ToolObservation>,
}

impl GatewayOutput {
    pub fn new(result: RawResult) -> Self {
        Self {
            result,
            ..Self::default()
        }
    }

    pub fn with_task_outputs(mut self, outputs: Vec<Option<String>>) -> Self {
        self.task_outputs = outputs;
        self
    }

    pub fn with_answer(mut self, answer: impl Into<String>) -> Self {
        self.answer = Some(answer.into());
        self
    }
}

/// 执行网关：同步调用，可能耗时数十秒到数分钟
pub trait ExecutionGateway: Send + Sync {
    fn execute(
        &self,
        tasks: &[TaskDescriptor],
        cancel: &CancellationToken,
    ) -> Result<GatewayOutput, GatewayError>;
}
