//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `STUDY__*` 覆盖（双下划线表示嵌套，如 `STUDY__PIPELINE__GATEWAY_TIMEOUT_SECS=120`）。
//! 配置在进程启动时加载一次，之后只读共享，不随请求修改。

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub pipeline: PipelineSection,
    pub roster: RosterSection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppSection {
    pub name: Option<String>,
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：deepseek / openai / mock
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub deepseek: ModelOverride,
    pub openai: ModelOverride,
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "deepseek".to_string(),
            model: "deepseek-chat".to_string(),
            base_url: None,
            deepseek: ModelOverride::default(),
            openai: ModelOverride::default(),
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ModelOverride {
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    /// 单次 LLM 请求超时（秒）
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self { request: 60 }
    }
}

/// [pipeline] 段：执行网关超时、并发上限、salvage 阈值
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    /// 单次网关调用的外部超时（秒），默认 300
    pub gateway_timeout_secs: u64,
    /// 同时运行的网关调用上限（worker pool 大小）
    pub max_concurrent_executions: usize,
    /// 从格式错误信息中抢救出的推理片段最少字符数
    pub salvage_min_chars: usize,
    /// 白板工具单次调用超时（秒）
    pub tool_timeout_secs: u64,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            gateway_timeout_secs: 300,
            max_concurrent_executions: 4,
            salvage_min_chars: 40,
            tool_timeout_secs: 30,
        }
    }
}

/// [roster] 段：默认角色、短名别名表、可选的角色目录覆盖
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RosterSection {
    pub default_role: String,
    pub aliases: BTreeMap<String, String>,
    /// 为空时使用内置目录
    pub roles: Vec<RoleEntry>,
}

impl Default for RosterSection {
    fn default() -> Self {
        Self {
            default_role: "Problem Analyst".to_string(),
            aliases: default_aliases(),
            roles: Vec::new(),
        }
    }
}

/// [[roster.roles]] 条目
#[derive(Debug, Clone, Deserialize)]
pub struct RoleEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub can_emit_whiteboard: bool,
    /// 主答者（Main Answer Selector 优先采用其回答）
    #[serde(default)]
    pub primary: bool,
}

fn default_aliases() -> BTreeMap<String, String> {
    [
        ("expert", "Problem Analyst"),
        ("analyst", "Problem Analyst"),
        ("professor", "Socratic Mentor"),
        ("mentor", "Socratic Mentor"),
        ("challenger", "Critical Thinker"),
        ("student", "Peer Student"),
        ("peer", "Peer Student"),
        ("connector", "Interdisciplinary Connector"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// 从 config 目录加载配置，环境变量 STUDY__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 STUDY__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    for name in ["config/default", "../config/default", "default"] {
        if std::path::Path::new(&format!("{name}.toml")).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(path) = config_path.filter(|p| p.exists()) {
        builder = builder.add_source(config::File::from(path).required(false));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("STUDY")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}
