//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / execute），由 ToolRegistry 按名注册与查找，
//! ToolExecutor 在调用时加超时并统一转 ToolError。按名排序存储，生成的提示词段落稳定。

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::ToolError;

/// 工具 trait：名称、描述（供 LLM 理解）、参数 schema、异步执行（args 为 JSON）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（用于 JSON 中的 "tool" 字段）
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// 参数 JSON Schema；默认无参数
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String>;
}

#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 白板工具集（generate_whiteboard_visual + flex 版本）
    pub fn whiteboard() -> Self {
        let mut registry = Self::new();
        registry.register(crate::tools::WhiteboardTool);
        registry.register(crate::tools::WhiteboardFlexTool);
        registry
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub async fn execute(&self, name: &str, args: Value) -> Result<String, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        tool.execute(args).await.map_err(ToolError::ExecutionFailed)
    }

    /// 工具清单 JSON（name / description / parameters），拼入 system prompt
    pub fn to_schema_json(&self) -> String {
        let tools: Vec<Value> = self
            .tools
            .iter()
            .map(|(name, tool)| {
                serde_json::json!({
                    "name": name,
                    "description": tool.description(),
                    "parameters": tool.parameters_schema()
                })
            })
            .collect();
        serde_json::to_string_pretty(&tools).unwrap_or_else(|_| "[]".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{WHITEBOARD_FLEX_TOOL_NAME, WHITEBOARD_TOOL_NAME};

    #[test]
    fn test_whiteboard_registry_lists_both_tools() {
        let registry = ToolRegistry::whiteboard();
        assert!(registry.get(WHITEBOARD_TOOL_NAME).is_some());
        assert!(registry.get(WHITEBOARD_FLEX_TOOL_NAME).is_some());
        let schema = registry.to_schema_json();
        assert!(schema.contains("\"topic\""));
        assert!(schema.contains("payload"));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let registry = ToolRegistry::whiteboard();
        let err = registry.execute("shell", serde_json::json!({})).await.unwrap_err();
        assert_eq!(err, ToolError::UnknownTool("shell".to_string()));
    }
}
