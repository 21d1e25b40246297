//! Result Normalizer：RawResult -> 有序 AgentMessage 列表
//!
//! 优先级（产出第一条有效消息后即不再走兜底）：
//! 1. List：按位置与任务配对，多出的项使用 FALLBACK_ROLE
//! 2. Map：按任务顺序为每个任务认领最匹配的键（完全相等，否则双向包含），未认领的键以 FALLBACK_ROLE 追加
//! 3. ObjectWithCollection：按集合形状走 1 或 2
//! 4. 仍无消息时，使用 raw 文本，角色取第一个任务
//! 5. 任务级输出：对还没有消息的角色补上
//! 6. 仍为空：把整个 RawResult 字符串化，角色取第一个任务
//!
//! 最后统一丢弃空白 / 纯围栏占位的消息，并按文本完全相等去重（保留首次出现）。

use std::collections::HashSet;

use crate::composer::TaskDescriptor;
use crate::gateway::{Collection, GatewayOutput, RawResult};
use crate::result::{AgentMessage, FALLBACK_ROLE};

/// 文本是否承载内容：非空白、不是只有围栏标记、不是 None / null 之类的占位词
pub fn is_meaningful(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return false;
    }
    if matches!(trimmed.to_lowercase().as_str(), "none" | "null" | "undefined") {
        return false;
    }
    !trimmed.lines().all(|line| {
        let line = line.trim();
        line.is_empty() || is_fence_line(line)
    })
}

/// 围栏行：以 ``` 开头，其后只有可选的语言标签；行内代码（`42`）不算
fn is_fence_line(line: &str) -> bool {
    let Some(rest) = line.strip_prefix("```") else {
        return false;
    };
    let tag = rest.trim_start_matches('`');
    tag.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '+'))
}

pub fn normalize(tasks: &[TaskDescriptor], output: &GatewayOutput) -> Vec<AgentMessage> {
    let first_role = tasks
        .first()
        .map(|t| t.role.name.as_str())
        .unwrap_or(FALLBACK_ROLE);
    let mut messages = Vec::new();

    match &output.result {
        RawResult::List(items)
        | RawResult::ObjectWithCollection {
            items: Collection::List(items),
            ..
        } => from_list(tasks, items, &mut messages),
        RawResult::Map(pairs)
        | RawResult::ObjectWithCollection {
            items: Collection::Map(pairs),
            ..
        } => from_map(tasks, pairs, &mut messages),
        RawResult::ObjectWithRaw(_) | RawResult::Scalar(_) | RawResult::Empty => {}
    }

    if !messages.iter().any(|m| is_meaningful(&m.text)) {
        let raw = match &output.result {
            RawResult::ObjectWithRaw(text) => Some(text),
            RawResult::ObjectWithCollection { raw, .. } => raw.as_ref(),
            _ => None,
        };
        if let Some(text) = raw {
            messages.push(AgentMessage::new(first_role, text.trim()));
        }
    }

    for (task, out) in tasks.iter().zip(&output.task_outputs) {
        let Some(text) = out.as_deref().filter(|t| is_meaningful(t)) else {
            continue;
        };
        let has_message = messages
            .iter()
            .any(|m| m.role == task.role.name && is_meaningful(&m.text));
        if !has_message {
            messages.push(AgentMessage::new(task.role.name.as_str(), text.trim()));
        }
    }

    if !messages.iter().any(|m| is_meaningful(&m.text)) {
        messages.push(AgentMessage::new(first_role, output.result.to_string().trim()));
    }

    dedupe(messages)
}

/// 丢弃无内容的消息，并按文本去重（保留首次出现的角色）
pub fn dedupe(messages: Vec<AgentMessage>) -> Vec<AgentMessage> {
    let mut seen = HashSet::new();
    messages
        .into_iter()
        .filter(|m| is_meaningful(&m.text))
        .filter(|m| seen.insert(m.text.clone()))
        .collect()
}

fn from_list(tasks: &[TaskDescriptor], items: &[String], out: &mut Vec<AgentMessage>) {
    for (i, item) in items.iter().enumerate() {
        let role = tasks
            .get(i)
            .map(|t| t.role.name.as_str())
            .unwrap_or(FALLBACK_ROLE);
        out.push(AgentMessage::new(role, item.trim()));
    }
}

fn from_map(tasks: &[TaskDescriptor], pairs: &[(String, String)], out: &mut Vec<AgentMessage>) {
    let mut claimed = vec![false; pairs.len()];
    for task in tasks {
        if let Some(idx) = best_key(&task.prompt, pairs, &claimed) {
            claimed[idx] = true;
            out.push(AgentMessage::new(task.role.name.as_str(), pairs[idx].1.trim()));
        }
    }
    for ((_, text), taken) in pairs.iter().zip(&claimed) {
        if !taken {
            out.push(AgentMessage::new(FALLBACK_ROLE, text.trim()));
        }
    }
}

/// 为任务提示找最匹配的未认领键：完全相等优先，其次任一方向的包含
fn best_key(prompt: &str, pairs: &[(String, String)], claimed: &[bool]) -> Option<usize> {
    let prompt = prompt.trim();
    let open: Vec<(usize, &str)> = pairs
        .iter()
        .enumerate()
        .filter(|(i, _)| !claimed[*i])
        .map(|(i, (key, _))| (i, key.trim()))
        .filter(|(_, key)| !key.is_empty())
        .collect();
    open.iter()
        .find(|(_, key)| *key == prompt)
        .or_else(|| {
            open.iter()
                .find(|(_, key)| prompt.contains(key) || key.contains(prompt))
        })
        .map(|(i, _)| *i)
}
