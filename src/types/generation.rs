//! Generation settings and stop reasons.

use bon::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Sampling and length settings forwarded to the provider.
///
/// Everything is optional; adapters only serialize what is set.
#[derive(Debug, Clone, Builder, Serialize, Deserialize, Default, PartialEq)]
pub struct GenerationSettings {
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub max_tokens: Option<u32>,
}

/// Normalized reason a model turn ended.
///
/// Every provider's native finish reason collapses into this four-value set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StopReason {
    /// Natural completion.
    Stop,
    /// Output-token limit reached.
    Length,
    /// The model is requesting tool execution.
    ToolUse,
    /// The provider reported a terminal error condition.
    Error,
}
