//! 工具层：注册表、带超时与审计的执行器、tool call schema、白板可视化工具

pub mod executor;
pub mod registry;
pub mod schema;
pub mod whiteboard;

pub use executor::ToolExecutor;
pub use registry::{Tool, ToolRegistry};
pub use schema::{tool_call_schema_json, ToolCall};
pub use whiteboard::{
    render_visual, WhiteboardArgs, WhiteboardFlexTool, WhiteboardTool, WHITEBOARD_FLEX_TOOL_NAME,
    WHITEBOARD_TOOL_NAME,
};
