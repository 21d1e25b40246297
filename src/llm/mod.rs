//! LLM 层：客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock），供 LlmGateway 使用

pub mod message;
pub mod mock;
pub mod openai;
pub mod provider;
pub mod traits;

pub use message::{Message, Role};
pub use mock::MockLlmClient;
pub use openai::OpenAiClient;
pub use provider::{create_deepseek_client, create_llm_from_config, DEEPSEEK_CHAT};
pub use traits::LlmClient;
