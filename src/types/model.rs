//! Model definitions and protocol tags.

use serde::{Deserialize, Serialize};

use crate::types::usage::{Cost, Usage};

/// Wire protocol spoken by a model's endpoint.
///
/// This set is closed: adapter selection is a total match over it, and adding
/// a protocol means adding an adapter, not subclassing one.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
pub enum WireProtocol {
    #[serde(rename = "openai-completions")]
    #[strum(serialize = "openai-completions")]
    OpenAiCompletions,
    #[serde(rename = "openai-responses")]
    #[strum(serialize = "openai-responses")]
    OpenAiResponses,
    #[serde(rename = "anthropic-messages")]
    #[strum(serialize = "anthropic-messages")]
    AnthropicMessages,
    #[serde(rename = "google-generate-content")]
    #[strum(serialize = "google-generate-content")]
    GoogleGenerateContent,
}

/// What a model can do.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelCapabilities {
    pub vision: bool,
    pub tools: bool,
    pub streaming: bool,
    pub reasoning: bool,
}

impl Default for ModelCapabilities {
    fn default() -> Self {
        Self {
            vision: false,
            tools: true,
            streaming: true,
            reasoning: false,
        }
    }
}

/// An immutable model catalogue entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelDefinition {
    pub id: String,
    pub display_name: String,
    pub provider: String,
    pub protocol: WireProtocol,
    pub base_url: String,
    pub context_window: u32,
    pub max_output_tokens: u32,
    /// USD per million input tokens.
    pub input_cost_per_million: f64,
    /// USD per million output tokens.
    pub output_cost_per_million: f64,
    pub capabilities: ModelCapabilities,
}

impl ModelDefinition {
    /// Estimated cost of the given usage at this model's rates.
    pub fn cost_for(&self, usage: &Usage) -> Cost {
        Cost::from_usage(
            usage,
            self.input_cost_per_million,
            self.output_cost_per_million,
        )
    }
}
