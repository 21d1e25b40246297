//! 脚本化网关（测试 / 离线演示用）：按预设返回结果或错误，记录调用次数与最近一次的任务列表

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::composer::TaskDescriptor;
use crate::core::GatewayError;
use crate::gateway::{ExecutionGateway, GatewayOutput, RawResult};

type Script = Box<dyn Fn(&[TaskDescriptor]) -> Result<GatewayOutput, GatewayError> + Send + Sync>;

pub struct ScriptedGateway {
    script: Script,
    delay: Duration,
    calls: AtomicUsize,
    saw_cancel: AtomicBool,
    last_tasks: Mutex<Vec<TaskDescriptor>>,
}

impl ScriptedGateway {
    pub fn from_fn(
        f: impl Fn(&[TaskDescriptor]) -> Result<GatewayOutput, GatewayError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Box::new(f),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            saw_cancel: AtomicBool::new(false),
            last_tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn ok(result: RawResult) -> Self {
        Self::with_output(GatewayOutput::new(result))
    }

    /// 引擎以 JSON 返回结果：在边界处经 RawResult::from_value 适配
    pub fn json(value: serde_json::Value) -> Self {
        Self::ok(RawResult::from_value(value))
    }

    pub fn with_output(output: GatewayOutput) -> Self {
        Self::from_fn(move |_| Ok(output.clone()))
    }

    pub fn err(error: GatewayError) -> Self {
        Self::from_fn(move |_| Err(error.clone()))
    }

    /// 每个任务回显一句话，形状为 List
    pub fn echo() -> Self {
        Self::from_fn(|tasks| {
            Ok(GatewayOutput::new(RawResult::List(
                tasks
                    .iter()
                    .map(|t| format!("{} says: let's work through this together.", t.role.name))
                    .collect(),
            )))
        })
    }

    /// 模拟长时间运行；期间每 10ms 检查一次取消
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 延迟期间是否观察到取消
    pub fn saw_cancel(&self) -> bool {
        self.saw_cancel.load(Ordering::SeqCst)
    }

    pub fn last_tasks(&self) -> Vec<TaskDescriptor> {
        self.last_tasks
            .lock()
            .map(|t| t.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl ExecutionGateway for ScriptedGateway {
    fn execute(
        &self,
        tasks: &[TaskDescriptor],
        cancel: &CancellationToken,
    ) -> Result<GatewayOutput, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_tasks.lock() {
            *last = tasks.to_vec();
        }

        let deadline = Instant::now() + self.delay;
        while Instant::now() < deadline {
            if cancel.is_cancelled() {
                self.saw_cancel.store(true, Ordering::SeqCst);
                return Err(GatewayError::Cancelled);
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        (self.script)(tasks)
    }
}
