//! 核心层：网关错误与恢复、有界执行池

pub mod error;
pub mod recovery;
pub mod task_scheduler;

pub use error::{GatewayError, RecoveryAction, ToolError};
pub use recovery::RecoveryEngine;
pub use task_scheduler::ExecutionPool;
