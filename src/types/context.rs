//! Conversation context owned by one agent run.

use serde::{Deserialize, Serialize};

use super::message::Message;

/// A tool made visible to the model for a turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    /// Unique within one context.
    pub name: String,
    pub description: String,
    /// JSON-Schema subset object (see [`crate::tools::validation`]).
    pub parameters: serde_json::Value,
}

/// The conversation state for one agent run.
///
/// Exclusively owned by a single in-flight run; never shared across
/// concurrent loops. The message list is append-only: entries are never
/// mutated in place or reordered, so hosts can mirror emitted events into an
/// append-only store without reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Context {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default)]
    messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    /// Append a message. There is deliberately no way to edit or remove one.
    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }
}
