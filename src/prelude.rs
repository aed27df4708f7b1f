//! Convenience re-exports for common use.

pub use crate::agent_loop::{AgentHandle, AgentLoop, AgentOutcome, AgentRequest, RunStatus};
pub use crate::error::{ColloquyError, Result};
pub use crate::provider::ModelProvider;
pub use crate::tools::{FunctionTool, Tool, ToolOutput, ToolParameters};
pub use crate::types::{
    AgentEvent, Context, ContentBlock, GenerationSettings, Message, ModelDefinition, Role,
    StopReason, StreamEvent, ToolCall, ToolDefinition, ToolResult, Usage, WireProtocol,
};
