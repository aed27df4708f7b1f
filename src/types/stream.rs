//! Normalized stream events produced by protocol adapters.

use serde::{Deserialize, Serialize};

use super::generation::StopReason;
use super::usage::Usage;

/// One normalized event from a provider stream.
///
/// Adapters translate each provider's native stream into this union; the
/// accumulator folds a sequence of these into one finished assistant turn.
///
/// Ordering contract per tool call id: exactly one `ToolCallStart`, then any
/// number of `ToolCallDelta`s, then at most one `ToolCallEnd`. Adapters must
/// uphold this even when the provider interleaves several calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Incremental assistant text.
    TextDelta { text: String },
    /// Incremental reasoning/thinking text.
    ThinkingDelta { text: String },
    /// A tool call opened; `id` is unique within the turn.
    ToolCallStart { id: String, name: String },
    /// An argument-text fragment for an open tool call.
    ToolCallDelta { id: String, arguments: String },
    /// A tool call's arguments are complete.
    ToolCallEnd { id: String },
    /// Token usage as reported by the provider.
    Usage { usage: Usage },
    /// A provider-emitted error payload; the stream may still continue.
    Error { message: String },
    /// Terminal event with the provider's normalized stop reason.
    Done { stop_reason: StopReason },
}
