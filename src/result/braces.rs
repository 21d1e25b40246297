//! 文本扫描器：代码围栏与平衡大括号
//!
//! 纯函数，不关心 JSON 语义，只返回候选片段在原文中的字节区间。

use std::ops::Range;

/// 一个闭合的 ``` 代码块
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FencedBlock<'a> {
    /// 开围栏后的语言标记（已 trim），无标记为空串
    pub tag: &'a str,
    pub body: &'a str,
    /// 含两侧围栏的完整区间
    pub span: Range<usize>,
}

const FENCE: &str = "```";

/// 按出现顺序配对围栏；未闭合的末尾块丢弃
pub fn fenced_blocks(text: &str) -> Vec<FencedBlock<'_>> {
    let mut blocks = Vec::new();
    let mut cursor = 0;
    while let Some(open_rel) = text[cursor..].find(FENCE) {
        let open = cursor + open_rel;
        let after_open = open + FENCE.len();
        let line_end = text[after_open..]
            .find('\n')
            .map(|n| after_open + n)
            .unwrap_or(text.len());
        let first_line = &text[after_open..line_end];

        // 同一行内闭合的 ```{...}```
        if let Some(close_rel) = first_line.find(FENCE) {
            let close = after_open + close_rel;
            blocks.push(FencedBlock {
                tag: "",
                body: &text[after_open..close],
                span: open..close + FENCE.len(),
            });
            cursor = close + FENCE.len();
            continue;
        }

        let first = first_line.trim();
        let (tag, body_start) = if first
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '+'))
        {
            (first, (line_end + 1).min(text.len()))
        } else {
            ("", after_open)
        };
        let Some(close_rel) = text[body_start..].find(FENCE) else {
            break;
        };
        let close = body_start + close_rel;
        let end = close + FENCE.len();
        blocks.push(FencedBlock {
            tag,
            body: &text[body_start..close],
            span: open..end,
        });
        cursor = end;
    }
    blocks
}

/// 平衡大括号候选区间：先返回不含子对象的「扁平」对象，再按起点顺序返回嵌套对象（外层在前）。
/// 处于大括号内部时识别双引号字符串与转义，字符串中的括号不计数。
pub fn brace_candidates(text: &str) -> Vec<Range<usize>> {
    struct Open {
        start: usize,
        has_child: bool,
    }

    let mut stack: Vec<Open> = Vec::new();
    let mut flat = Vec::new();
    let mut nested = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' if !stack.is_empty() => in_string = true,
            '{' => {
                if let Some(parent) = stack.last_mut() {
                    parent.has_child = true;
                }
                stack.push(Open {
                    start: i,
                    has_child: false,
                });
            }
            '}' => {
                if let Some(open) = stack.pop() {
                    let span = open.start..i + 1;
                    if open.has_child {
                        nested.push(span);
                    } else {
                        flat.push(span);
                    }
                }
            }
            _ => {}
        }
    }

    nested.sort_by_key(|r| r.start);
    flat.extend(nested);
    flat
}
