//! Study Crew - 一次性运行器
//!
//! 从命令行参数或 stdin 的 JSON 读入一个求助请求，跑完整条管线，把 StudyHelpResult 以 JSON 打印到 stdout。
//!
//! ```bash
//! study-crew --discussion --role professor --subject mathematics "Graph y = x^2 - 5x + 6"
//! echo '{"question": "What is osmosis?", "mode": "single"}' | study-crew
//! ```
//!
//! 后端由 [llm] 配置与 DEEPSEEK_API_KEY / OPENAI_API_KEY 决定，都没有时使用 Mock。

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use study_crew::config::{load_config, AppConfig};
use study_crew::llm::create_llm_from_config;
use study_crew::{observability, HelpMode, StudyHelpRequest, StudyHelpService};

/// 多角色学习辅导：回答一个问题并输出 JSON 结果
#[derive(Parser, Debug)]
#[command(name = "study-crew", version)]
struct CliArgs {
    /// 配置文件路径（叠加在 config/default.toml 之上）
    #[arg(long)]
    config: Option<PathBuf>,

    /// 讨论模式：多个角色依次发言
    #[arg(long, conflicts_with = "single")]
    discussion: bool,

    /// 单答模式
    #[arg(long)]
    single: bool,

    /// 偏好角色（id、名称或别名，如 professor）
    #[arg(long)]
    role: Option<String>,

    #[arg(long)]
    subject: Option<String>,

    /// 可用角色列表，逗号分隔
    #[arg(long, value_delimiter = ',')]
    available: Option<Vec<String>>,

    /// 学生问题；省略时从 stdin 读取 JSON 请求
    question: Vec<String>,
}

impl CliArgs {
    fn mode(&self) -> Option<HelpMode> {
        if self.discussion {
            Some(HelpMode::Discussion)
        } else if self.single {
            Some(HelpMode::Single)
        } else {
            None
        }
    }
}

fn build_request(cli: CliArgs) -> anyhow::Result<StudyHelpRequest> {
    let mut request = if cli.question.is_empty() {
        let mut input = String::new();
        std::io::stdin()
            .read_to_string(&mut input)
            .context("Failed to read request from stdin")?;
        serde_json::from_str::<StudyHelpRequest>(&input).context("Invalid request JSON")?
    } else {
        StudyHelpRequest::new(cli.question.join(" "), HelpMode::Single)
    };
    if let Some(mode) = cli.mode() {
        request.mode = mode;
    }
    if let Some(role) = cli.role {
        request.preferred_role = Some(role);
    }
    if let Some(subject) = cli.subject {
        request.subject = subject;
    }
    if let Some(available) = cli.available {
        request.available_roles = Some(
            available
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        );
    }
    Ok(request)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cli = CliArgs::parse();
    let cfg = load_config(cli.config.clone()).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        AppConfig::default()
    });
    let request = build_request(cli)?;

    let llm = create_llm_from_config(&cfg.llm);
    let service = Arc::new(StudyHelpService::with_llm(&cfg, llm));

    // Ctrl-C 时取消进行中的网关调用，仍然输出结果
    let on_interrupt = service.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling");
            on_interrupt.shutdown();
        }
    });

    let result = service.handle(&request).await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
