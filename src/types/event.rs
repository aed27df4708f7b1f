//! Public events emitted by the agent loop.

use serde::{Deserialize, Serialize};

use super::message::{Message, ToolCall, ToolResult};
use super::usage::Usage;

/// The agent loop's public output.
///
/// This is everything an external collaborator (UI, persistence) observes
/// while a run is in flight. Deltas are forwarded with no buffering so hosts
/// can render live typing; `AssistantMessage` arrives exactly once per turn
/// when the stream for that turn ends.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Incremental assistant text, forwarded as it streams.
    StreamDelta { text: String },
    /// Incremental reasoning text, forwarded as it streams.
    ThinkingDelta { text: String },
    /// The fully accumulated assistant turn.
    AssistantMessage { message: Message },
    /// Emitted immediately before a tool call is dispatched.
    ToolCallStarted { call: ToolCall },
    /// Emitted after a tool call resolves, successfully or not.
    ToolCallCompleted { call: ToolCall, result: ToolResult },
    /// Token usage reported by the provider.
    UsageUpdate { usage: Usage },
    /// A failure the host should surface; not necessarily terminal.
    Error { message: String },
    /// Terminal event; nothing follows.
    Done,
}
