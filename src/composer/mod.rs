//! Task Flow Composer：决定哪些角色发言、顺序如何、哪一个开放白板工具
//!
//! - single：恰好一个任务（偏好角色 → 默认角色 → 受限目录的第一个角色）
//! - discussion：`[偏好角色] + 其余角色（规范顺序）`，去重并按 available_roles 过滤
//! - 目录为空（含 available_roles 显式为空）时返回零个任务，由调用方当作「无人应答」处理
//!
//! 相同输入总是得到相同的任务列表。

pub mod classifier;

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use classifier::{FixedVisualClassifier, KeywordVisualClassifier, VisualClassifier};

use crate::roster::{AgentRole, Roster};

/// 提示词中学生问题所在行的前缀
pub const QUESTION_LABEL: &str = "Student question: ";

/// 求助模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HelpMode {
    #[default]
    #[serde(alias = "explanation", alias = "single-answer")]
    Single,
    Discussion,
}

/// 对话历史中的一轮
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryTurn {
    #[serde(alias = "role", alias = "agent")]
    pub speaker: String,
    #[serde(alias = "content", alias = "text")]
    pub message: String,
}

/// 单个任务：由 Composer 按请求创建，之后不再修改
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDescriptor {
    pub role: AgentRole,
    pub prompt: String,
    pub tools_enabled: bool,
}

/// 一次编排的输入
#[derive(Debug, Clone, Copy)]
pub struct CompositionInput<'a> {
    pub question: &'a str,
    pub subject: &'a str,
    pub mode: HelpMode,
    pub preferred_role: Option<&'a str>,
    /// Some(空) 表示没有任何可用角色
    pub available_roles: Option<&'a [String]>,
    pub history: &'a [HistoryTurn],
}

/// 任务编排器：持有只读目录与可视化判定器
#[derive(Clone)]
pub struct TaskComposer {
    roster: Arc<Roster>,
    classifier: Arc<dyn VisualClassifier>,
}

impl TaskComposer {
    pub fn new(roster: Arc<Roster>, classifier: Arc<dyn VisualClassifier>) -> Self {
        Self { roster, classifier }
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn compose(&self, input: &CompositionInput<'_>) -> Vec<TaskDescriptor> {
        let allowed = self.restricted_roles(input.available_roles);
        let preferred = input
            .preferred_role
            .and_then(|name| self.roster.resolve(name))
            .filter(|role| allowed.iter().any(|r| r.id == role.id));
        if input.preferred_role.is_some() && preferred.is_none() {
            tracing::debug!(preferred = ?input.preferred_role, "preferred role not resolved, ignoring");
        }

        let order: Vec<&AgentRole> = match input.mode {
            HelpMode::Single => {
                let default = self
                    .roster
                    .default_role()
                    .filter(|role| allowed.iter().any(|r| r.id == role.id));
                preferred
                    .or(default)
                    .or_else(|| allowed.first().copied())
                    .into_iter()
                    .collect()
            }
            HelpMode::Discussion => {
                let mut seen = HashSet::new();
                preferred
                    .into_iter()
                    .chain(allowed.iter().copied())
                    .filter(|role| seen.insert(role.id.clone()))
                    .collect()
            }
        };

        let context = render_history(input.history);
        let visual = !order.is_empty()
            && self
                .classifier
                .should_visualize(input.question, &context, input.subject);

        let mut tools_assigned = false;
        order
            .into_iter()
            .map(|role| {
                let tools_enabled = visual && !tools_assigned && role.can_emit_whiteboard;
                tools_assigned |= tools_enabled;
                TaskDescriptor {
                    role: role.clone(),
                    prompt: build_prompt(role, input, &context, tools_enabled),
                    tools_enabled,
                }
            })
            .collect()
    }

    /// 按 available_roles 过滤后的目录（保持规范顺序）；None 表示不限制
    fn restricted_roles(&self, available: Option<&[String]>) -> Vec<&AgentRole> {
        match available {
            None => self.roster.roles().iter().collect(),
            Some(names) => {
                let ids: HashSet<&str> = names
                    .iter()
                    .filter_map(|n| self.roster.resolve(n))
                    .map(|r| r.id.as_str())
                    .collect();
                self.roster
                    .roles()
                    .iter()
                    .filter(|r| ids.contains(r.id.as_str()))
                    .collect()
            }
        }
    }
}

fn render_history(history: &[HistoryTurn]) -> String {
    history
        .iter()
        .filter(|t| !t.message.trim().is_empty())
        .map(|t| format!("{}: {}", t.speaker.trim(), t.message.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn build_prompt(role: &AgentRole, input: &CompositionInput<'_>, context: &str, tools_enabled: bool) -> String {
    let mut prompt = format!(
        "Respond as the {}.\n{QUESTION_LABEL}{}\nSubject: {}\n",
        role.name,
        input.question.trim(),
        input.subject
    );
    if !context.is_empty() {
        prompt.push_str(&format!("Conversation so far:\n{context}\n"));
    }
    prompt.push('\n');
    prompt.push_str(match input.mode {
        HelpMode::Single => {
            "Explain the concept clearly for an intermediate learner, step by step, and finish with a short check-for-understanding question."
        }
        HelpMode::Discussion => {
            "Contribute your own perspective to this class discussion in a few sentences. Build on what earlier speakers said instead of repeating it."
        }
    });
    if tools_enabled {
        prompt.push_str(
            "\nA visual would help here: use the whiteboard tool once, then explain the visual in words.",
        );
    }
    prompt
}
