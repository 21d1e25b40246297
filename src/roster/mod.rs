//! 角色目录（Agent Roster）
//!
//! 进程启动时构建一次，之后只读共享（`Arc<Roster>`）。目录顺序即讨论模式的规范顺序。
//! 角色解析对 id、显示名与短名别名均大小写不敏感；解析不到时返回 None，不报错。

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::RosterSection;

/// 一个具名推理角色
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentRole {
    pub id: String,
    pub name: String,
    pub goal: String,
    /// 是否允许产出白板载荷（决定任务是否开放白板工具）
    pub can_emit_whiteboard: bool,
    /// 主答者：Main Answer Selector 优先采用
    pub primary: bool,
}

impl AgentRole {
    pub fn new(id: &str, name: &str, goal: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            goal: goal.to_string(),
            can_emit_whiteboard: false,
            primary: false,
        }
    }

    pub fn with_whiteboard(mut self) -> Self {
        self.can_emit_whiteboard = true;
        self
    }

    pub fn as_primary(mut self) -> Self {
        self.primary = true;
        self
    }
}

/// 只读角色目录 + 别名表 + 默认角色名
#[derive(Debug, Clone)]
pub struct Roster {
    roles: Vec<AgentRole>,
    /// 小写别名 -> 角色显示名
    aliases: BTreeMap<String, String>,
    default_role: String,
}

impl Roster {
    /// 内置五角色目录（规范顺序）
    pub fn builtin() -> Self {
        Self::from_config(&RosterSection::default())
    }

    /// 按 [roster] 配置构建；roles 为空时使用内置目录
    pub fn from_config(section: &RosterSection) -> Self {
        let roles = if section.roles.is_empty() {
            builtin_roles()
        } else {
            section
                .roles
                .iter()
                .map(|r| AgentRole {
                    id: r.id.clone(),
                    name: r.name.clone(),
                    goal: r.goal.clone(),
                    can_emit_whiteboard: r.can_emit_whiteboard,
                    primary: r.primary,
                })
                .collect()
        };
        Self::new(roles, section.aliases.clone(), &section.default_role)
    }

    pub fn new(roles: Vec<AgentRole>, aliases: BTreeMap<String, String>, default_role: &str) -> Self {
        let mut seen = std::collections::HashSet::new();
        let roles = roles
            .into_iter()
            .filter(|r| seen.insert(r.id.to_lowercase()))
            .collect();
        Self {
            roles,
            aliases: aliases
                .into_iter()
                .map(|(k, v)| (k.trim().to_lowercase(), v))
                .collect(),
            default_role: default_role.to_string(),
        }
    }

    pub fn roles(&self) -> &[AgentRole] {
        &self.roles
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// 解析角色名：先按 id / 显示名，再经别名表；都不匹配返回 None
    pub fn resolve(&self, name: &str) -> Option<&AgentRole> {
        let key = name.trim().to_lowercase();
        if key.is_empty() {
            return None;
        }
        self.find_exact(&key).or_else(|| {
            self.aliases
                .get(&key)
                .and_then(|target| self.find_exact(&target.trim().to_lowercase()))
        })
    }

    /// 配置的默认角色（单答模式在无偏好角色时使用）
    pub fn default_role(&self) -> Option<&AgentRole> {
        self.resolve(&self.default_role)
    }

    fn find_exact(&self, key: &str) -> Option<&AgentRole> {
        self.roles
            .iter()
            .find(|r| r.id.to_lowercase() == key || r.name.to_lowercase() == key)
    }
}

impl Default for Roster {
    fn default() -> Self {
        Self::builtin()
    }
}

fn builtin_roles() -> Vec<AgentRole> {
    vec![
        AgentRole::new(
            "socratic_mentor",
            "Socratic Mentor",
            "Guide the student to the answer with probing questions instead of handing it over",
        )
        .with_whiteboard(),
        AgentRole::new(
            "problem_analyst",
            "Problem Analyst",
            "Break the problem into steps and give a precise, correct solution",
        )
        .with_whiteboard()
        .as_primary(),
        AgentRole::new(
            "critical_thinker",
            "Critical Thinker",
            "Challenge assumptions and point out common mistakes and edge cases",
        ),
        AgentRole::new(
            "peer_student",
            "Peer Student",
            "Restate the idea in plain words the way a classmate who just understood it would",
        ),
        AgentRole::new(
            "interdisciplinary_connector",
            "Interdisciplinary Connector",
            "Connect the topic to other subjects and real-world uses",
        ),
    ]
}
