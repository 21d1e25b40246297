//! Study Crew - 多角色学习辅导管线
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **roster**: 只读角色目录与别名解析
//! - **composer**: Task Flow Composer（谁发言、什么顺序、谁能用白板）
//! - **gateway**: 执行网关边界（RawResult 适配、LLM 实现、脚本化实现）
//! - **core**: 网关错误、恢复引擎、有界执行池
//! - **result**: 结果规整、主回答选择、白板载荷提取
//! - **tools**: 白板工具、注册表与执行器
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）
//! - **service**: 串起整条管线的 StudyHelpService

pub mod composer;
pub mod config;
pub mod core;
pub mod gateway;
pub mod llm;
pub mod observability;
pub mod result;
pub mod roster;
pub mod service;
pub mod tools;

pub use composer::{HelpMode, TaskComposer, TaskDescriptor};
pub use result::{AgentMessage, StudyHelpResult, WhiteboardSpec};
pub use service::{StudyHelpRequest, StudyHelpService};
