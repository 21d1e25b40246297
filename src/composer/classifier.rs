//! 题目可视化判定：决定任务是否值得开放白板工具

use std::sync::OnceLock;

use regex::Regex;

/// 判定 (topic, context, subject) 是否适合配图
pub trait VisualClassifier: Send + Sync {
    fn should_visualize(&self, topic: &str, context: &str, subject: &str) -> bool;
}

/// 关键词判定器：命中可视化关键词，或理科科目下题目里出现方程式
#[derive(Debug, Clone)]
pub struct KeywordVisualClassifier {
    keywords: Vec<String>,
    equation_subjects: Vec<String>,
}

const VISUAL_KEYWORDS: &[&str] = &[
    "graph", "plot", "diagram", "draw", "sketch", "chart", "visualize", "visualise",
    "equation", "parabola", "curve", "slope", "axis", "geometry", "triangle", "circle",
    "vector", "flowchart", "timeline", "concept map", "mind map", "cycle", "step by step",
    "step-by-step", "molecule", "circuit", "histogram", "function",
];

const EQUATION_SUBJECTS: &[&str] = &[
    "math", "mathematics", "algebra", "calculus", "geometry", "physics", "chemistry", "statistics",
];

static EQUATION_RE: OnceLock<Option<Regex>> = OnceLock::new();

fn looks_like_equation(text: &str) -> bool {
    EQUATION_RE
        .get_or_init(|| Regex::new(r"(?i)[=^]|\bf\s*\(\s*x\s*\)").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(text))
}

impl Default for KeywordVisualClassifier {
    fn default() -> Self {
        Self {
            keywords: VISUAL_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            equation_subjects: EQUATION_SUBJECTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl KeywordVisualClassifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VisualClassifier for KeywordVisualClassifier {
    fn should_visualize(&self, topic: &str, context: &str, subject: &str) -> bool {
        let haystack = format!("{topic}\n{context}").to_lowercase();
        if self.keywords.iter().any(|k| haystack.contains(k.as_str())) {
            return true;
        }
        let subject = subject.trim().to_lowercase();
        self.equation_subjects.iter().any(|s| *s == subject) && looks_like_equation(topic)
    }
}

/// 固定结果的判定器（测试与禁用白板时使用）
#[derive(Debug, Clone, Copy)]
pub struct FixedVisualClassifier(pub bool);

impl VisualClassifier for FixedVisualClassifier {
    fn should_visualize(&self, _topic: &str, _context: &str, _subject: &str) -> bool {
        self.0
    }
}
