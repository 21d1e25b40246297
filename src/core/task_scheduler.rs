//! 执行池：把同步阻塞的网关调用放到 blocking worker 上运行
//!
//! Semaphore 限制同时运行的网关调用数；每次调用带外部超时，超时即取消 token 并返回 GatewayError::Timeout。
//! 请求之间不共享可变状态，调用之间没有顺序保证。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::composer::TaskDescriptor;
use crate::core::GatewayError;
use crate::gateway::{ExecutionGateway, GatewayOutput};

/// 有界 worker 池
#[derive(Clone)]
pub struct ExecutionPool {
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl ExecutionPool {
    pub fn new(max_concurrent: usize, timeout: Duration) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            timeout,
        }
    }

    /// 当前空闲许可数
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// 在 blocking worker 上执行网关；等待许可的时间也计入超时。
    /// 许可随 worker 一起释放：超时返回后，仍在运行的 worker 继续占用名额直到真正退出。
    pub async fn execute(
        &self,
        gateway: Arc<dyn ExecutionGateway>,
        tasks: Vec<TaskDescriptor>,
        parent: &CancellationToken,
    ) -> Result<GatewayOutput, GatewayError> {
        let token = parent.child_token();
        let worker_token = token.clone();
        let permits = self.permits.clone();

        let run = async move {
            let permit = permits
                .acquire_owned()
                .await
                .map_err(|e| GatewayError::Worker(e.to_string()))?;
            tokio::task::spawn_blocking(move || {
                let _permit = permit;
                gateway.execute(&tasks, &worker_token)
            })
            .await
            .map_err(|e| GatewayError::Worker(e.to_string()))?
        };

        match tokio::time::timeout(self.timeout, run).await {
            Ok(result) => result,
            Err(_) => {
                token.cancel();
                tracing::warn!(timeout_secs = self.timeout.as_secs(), "gateway call timed out");
                Err(GatewayError::Timeout(self.timeout))
            }
        }
    }
}

impl Default for ExecutionPool {
    fn default() -> Self {
        Self::new(4, Duration::from_secs(300))
    }
}
