//! StudyHelpService：把一次求助请求走完整条管线
//!
//! Composer -> ExecutionPool(ExecutionGateway) -> Normalizer -> Whiteboard Extractor -> Main Answer Selector，
//! 网关失败时交给 RecoveryEngine。调用方总能拿到一个结构完整的 StudyHelpResult。

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::composer::{
    CompositionInput, HelpMode, HistoryTurn, KeywordVisualClassifier, TaskComposer, TaskDescriptor,
};
use crate::config::AppConfig;
use crate::core::{ExecutionPool, GatewayError, RecoveryAction, RecoveryEngine};
use crate::gateway::{ExecutionGateway, GatewayOutput, LlmGateway};
use crate::llm::LlmClient;
use crate::result::normalizer::dedupe;
use crate::result::{
    extract_whiteboard, normalize, select_main_answer, strip_payload, StudyHelpResult,
};
use crate::roster::Roster;
use crate::tools::{ToolExecutor, ToolRegistry};

/// 入站请求；同时接受旧字段名（user_question / help_type / preferred_agent_role）
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyHelpRequest {
    #[serde(alias = "user_question")]
    pub question: String,
    #[serde(default = "default_subject")]
    pub subject: String,
    #[serde(default, alias = "help_type")]
    pub mode: HelpMode,
    #[serde(default, alias = "preferred_agent_role", alias = "agent")]
    pub preferred_role: Option<String>,
    #[serde(default, alias = "available_roles")]
    pub available_roles: Option<Vec<String>>,
    #[serde(default, alias = "conversation_history")]
    pub conversation_history: Vec<HistoryTurn>,
}

fn default_subject() -> String {
    "general".to_string()
}

impl StudyHelpRequest {
    pub fn new(question: impl Into<String>, mode: HelpMode) -> Self {
        Self {
            question: question.into(),
            subject: default_subject(),
            mode,
            preferred_role: None,
            available_roles: None,
            conversation_history: Vec::new(),
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn with_preferred_role(mut self, role: impl Into<String>) -> Self {
        self.preferred_role = Some(role.into());
        self
    }

    pub fn with_available_roles(mut self, roles: Vec<String>) -> Self {
        self.available_roles = Some(roles);
        self
    }
}

pub struct StudyHelpService {
    composer: TaskComposer,
    gateway: Arc<dyn ExecutionGateway>,
    pool: ExecutionPool,
    recovery: RecoveryEngine,
    shutdown: CancellationToken,
}

impl StudyHelpService {
    pub fn new(
        composer: TaskComposer,
        gateway: Arc<dyn ExecutionGateway>,
        pool: ExecutionPool,
        recovery: RecoveryEngine,
    ) -> Self {
        Self {
            composer,
            gateway,
            pool,
            recovery,
            shutdown: CancellationToken::new(),
        }
    }

    /// 按配置组装：目录、关键词可视化判定、有界执行池、恢复引擎
    pub fn from_config(cfg: &AppConfig, gateway: Arc<dyn ExecutionGateway>) -> Self {
        let roster = Arc::new(Roster::from_config(&cfg.roster));
        let composer = TaskComposer::new(roster, Arc::new(KeywordVisualClassifier::new()));
        let pool = ExecutionPool::new(
            cfg.pipeline.max_concurrent_executions,
            Duration::from_secs(cfg.pipeline.gateway_timeout_secs),
        );
        Self::new(
            composer,
            gateway,
            pool,
            RecoveryEngine::new(cfg.pipeline.salvage_min_chars),
        )
    }

    /// 以 LlmGateway（带白板工具）为执行网关
    pub fn with_llm(cfg: &AppConfig, llm: Arc<dyn LlmClient>) -> Self {
        let tools = Arc::new(ToolExecutor::new(
            ToolRegistry::whiteboard(),
            cfg.pipeline.tool_timeout_secs,
        ));
        Self::from_config(cfg, Arc::new(LlmGateway::new(llm, tools)))
    }

    /// 取消所有进行中的网关调用（进程退出时使用）
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub async fn handle(&self, request: &StudyHelpRequest) -> StudyHelpResult {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("study_help", %request_id, mode = ?request.mode);
        async move {
            let start = Instant::now();
            let result = self.run(request).await;
            let elapsed = start.elapsed();
            tracing::info!(
                success = result.success,
                responses = result.agent_responses.len(),
                whiteboard = result.whiteboard.is_some(),
                elapsed_ms = elapsed.as_millis() as u64,
                "study help finished"
            );
            result.with_execution_time(elapsed.as_secs_f64())
        }
        .instrument(span)
        .await
    }

    async fn run(&self, request: &StudyHelpRequest) -> StudyHelpResult {
        if request.question.trim().is_empty() {
            return StudyHelpResult::failed("question must not be empty");
        }

        let tasks = self.composer.compose(&CompositionInput {
            question: &request.question,
            subject: &request.subject,
            mode: request.mode,
            preferred_role: request.preferred_role.as_deref(),
            available_roles: request.available_roles.as_deref(),
            history: &request.conversation_history,
        });
        if tasks.is_empty() {
            tracing::info!("no responder available, gateway not invoked");
            return StudyHelpResult::no_responder();
        }

        let roles: Vec<&str> = tasks.iter().map(|t| t.role.name.as_str()).collect();
        tracing::info!(?roles, tools = tasks.iter().any(|t| t.tools_enabled), "tasks composed");

        let start = Instant::now();
        let outcome = self
            .pool
            .execute(self.gateway.clone(), tasks.clone(), &self.shutdown)
            .await;
        audit(&tasks, &outcome, start.elapsed());

        match outcome {
            Ok(output) => self.assemble(&tasks, &output),
            Err(err) => self.recover(&err),
        }
    }

    fn assemble(&self, tasks: &[TaskDescriptor], output: &GatewayOutput) -> StudyHelpResult {
        let mut messages = normalize(tasks, output);
        let found = extract_whiteboard(&messages, &output.tool_observations);
        let mut answer_field = output.answer.clone();

        if let Some(m) = &found {
            for msg in messages.iter_mut() {
                if let Some(stripped) = strip_payload(&msg.text, &m.source) {
                    msg.text = stripped;
                }
            }
            messages = dedupe(messages);
            answer_field = answer_field.map(|a| strip_payload(&a, &m.source).unwrap_or(a));
            tracing::debug!(origin = ?m.origin, kind = ?m.spec.kind, "whiteboard payload extracted");
        }

        let answer = select_main_answer(answer_field.as_deref(), &messages, self.composer.roster());
        StudyHelpResult::answered(answer, messages, found.map(|m| m.spec))
    }

    fn recover(&self, err: &GatewayError) -> StudyHelpResult {
        match self.recovery.handle(err) {
            RecoveryAction::Salvage(message) => StudyHelpResult::salvaged(message),
            RecoveryAction::Apologize => StudyHelpResult::rephrase(),
            RecoveryAction::Surface(detail) => {
                tracing::error!(error = %err, "gateway failed");
                StudyHelpResult::failed(detail)
            }
        }
    }
}

fn audit(tasks: &[TaskDescriptor], outcome: &Result<GatewayOutput, GatewayError>, elapsed: Duration) {
    let (ok, detail) = match outcome {
        Ok(output) => (true, output.result.shape().to_string()),
        Err(GatewayError::Format(_)) => (false, "format_error".to_string()),
        Err(GatewayError::Timeout(_)) => (false, "timeout".to_string()),
        Err(GatewayError::Transport(_)) => (false, "transport_error".to_string()),
        Err(GatewayError::Cancelled) => (false, "cancelled".to_string()),
        Err(GatewayError::Worker(_)) => (false, "worker_error".to_string()),
    };
    let audit = serde_json::json!({
        "event": "gateway_audit",
        "tasks": tasks.len(),
        "tools_enabled": tasks.iter().filter(|t| t.tools_enabled).count(),
        "ok": ok,
        "outcome": detail,
        "duration_ms": elapsed.as_millis() as u64,
    });
    tracing::info!(audit = %audit.to_string(), "gateway");
}
