//! 后端选择：根据 [llm] 配置与环境变量决定 DeepSeek / OpenAI 兼容 / Mock

use std::sync::Arc;

use crate::config::LlmSection;
use crate::llm::{LlmClient, MockLlmClient, OpenAiClient};

pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
pub const DEEPSEEK_CHAT: &str = "deepseek-chat";

/// 创建 DeepSeek 客户端：Key 取 `DEEPSEEK_API_KEY`，其次 `OPENAI_API_KEY`；模型默认 deepseek-chat
pub fn create_deepseek_client(model: Option<&str>) -> OpenAiClient {
    let api_key = std::env::var("DEEPSEEK_API_KEY")
        .ok()
        .or_else(|| std::env::var("OPENAI_API_KEY").ok());

    let model = model
        .map(String::from)
        .or_else(|| std::env::var("DEEPSEEK_MODEL").ok())
        .unwrap_or_else(|| DEEPSEEK_CHAT.to_string());

    OpenAiClient::new(Some(DEEPSEEK_BASE_URL), &model, api_key.as_deref())
}

/// 按配置构建 LLM 客户端。
///
/// provider = "mock" 时总是 Mock；否则有 DeepSeek Key（或 provider=deepseek 且仅有 OpenAI Key）走 DeepSeek，
/// 有 OpenAI Key 走 OpenAI 兼容端点；都没有时退回 Mock 并告警。
pub fn create_llm_from_config(cfg: &LlmSection) -> Arc<dyn LlmClient> {
    let provider = cfg.provider.to_lowercase();
    if provider == "mock" {
        tracing::info!("Using Mock LLM (configured)");
        return Arc::new(MockLlmClient);
    }

    let has_deepseek_key = std::env::var("DEEPSEEK_API_KEY").is_ok();
    let has_openai_key = std::env::var("OPENAI_API_KEY").is_ok();
    let use_deepseek = has_deepseek_key || (provider == "deepseek" && has_openai_key);
    let use_openai = has_openai_key && provider != "deepseek";

    if use_deepseek {
        let model = cfg
            .deepseek
            .model
            .clone()
            .unwrap_or_else(|| cfg.model.clone());
        tracing::info!("Using DeepSeek LLM ({})", model);
        Arc::new(create_deepseek_client(Some(&model)).with_request_timeout(cfg.timeouts.request))
    } else if use_openai {
        let model = cfg
            .openai
            .model
            .clone()
            .unwrap_or_else(|| "gpt-4o-mini".to_string());
        tracing::info!("Using OpenAI LLM ({})", model);
        Arc::new(
            OpenAiClient::new(cfg.base_url.as_deref(), &model, None)
                .with_request_timeout(cfg.timeouts.request),
        )
    } else {
        tracing::warn!("No API key set or provider unknown, using Mock LLM");
        Arc::new(MockLlmClient)
    }
}
