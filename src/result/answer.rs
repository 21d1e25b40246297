//! Main Answer Selector
//!
//! 优先级严格依次为：引擎单独报告的 answer > 第一条主答者发言 > 第一条有内容的发言 > 最长发言 > 固定占位语。

use crate::result::{is_meaningful, AgentMessage, NO_ANSWER_PLACEHOLDER};
use crate::roster::Roster;

pub fn select_main_answer(answer: Option<&str>, messages: &[AgentMessage], roster: &Roster) -> String {
    if let Some(answer) = answer.filter(|a| is_meaningful(a)) {
        return answer.trim().to_string();
    }

    let is_primary = |m: &&AgentMessage| roster.resolve(&m.role).is_some_and(|r| r.primary);
    if let Some(m) = messages.iter().find(is_primary) {
        return m.text.clone();
    }

    if let Some(m) = messages.iter().find(|m| !m.text.trim().is_empty()) {
        return m.text.clone();
    }

    messages
        .iter()
        .max_by_key(|m| m.text.chars().count())
        .filter(|m| !m.text.is_empty())
        .map(|m| m.text.clone())
        .unwrap_or_else(|| NO_ANSWER_PLACEHOLDER.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msgs() -> Vec<AgentMessage> {
        vec![
            AgentMessage::new("Socratic Mentor", "What do you notice about the roots?"),
            AgentMessage::new("Problem Analyst", "Factor it: (x - 2)(x - 3)."),
            AgentMessage::new("Peer Student", "Oh, so it crosses the axis twice!"),
        ]
    }

    #[test]
    fn test_explicit_answer_wins() {
        let roster = Roster::builtin();
        assert_eq!(select_main_answer(Some("  reported  "), &msgs(), &roster), "reported");
        assert_eq!(
            select_main_answer(Some("```"), &msgs(), &roster),
            "Factor it: (x - 2)(x - 3)."
        );
    }

    #[test]
    fn test_primary_role_before_first_message() {
        let roster = Roster::builtin();
        assert_eq!(select_main_answer(None, &msgs(), &roster), "Factor it: (x - 2)(x - 3).");
    }

    #[test]
    fn test_first_message_without_primary() {
        let roster = Roster::builtin();
        let mut m = msgs();
        m.remove(1);
        assert_eq!(select_main_answer(None, &m, &roster), "What do you notice about the roots?");
    }

    #[test]
    fn test_longest_when_all_blank_then_placeholder() {
        let roster = Roster::builtin();
        let blank = vec![AgentMessage::new("Agent", " "), AgentMessage::new("Agent", "   ")];
        assert_eq!(select_main_answer(None, &blank, &roster), "   ");
        assert_eq!(select_main_answer(None, &[], &roster), NO_ANSWER_PLACEHOLDER);
    }
}
