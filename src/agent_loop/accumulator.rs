//! Fold one turn's stream events into a finished assistant message.

use tracing::warn;

use crate::types::{Message, StopReason, StreamEvent, ToolCall, Usage};

/// One finished model turn.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedTurn {
    /// Assistant message with accumulated text, thinking, and tool calls.
    pub message: Message,
    pub stop_reason: StopReason,
    /// Usage for this turn only; the loop merges turns into a run total.
    pub usage: Usage,
}

/// Per-turn accumulator consuming [`StreamEvent`]s.
///
/// Tool-call argument fragments are concatenated per id in arrival order and
/// stay raw text until someone asks for them parsed. Events referencing an id
/// that never started are dropped with a warning rather than failing the turn.
#[derive(Debug, Default)]
pub struct TurnAccumulator {
    text: String,
    thinking: String,
    calls: Vec<PartialCall>,
    usage: Usage,
    stop_reason: Option<StopReason>,
}

#[derive(Debug)]
struct PartialCall {
    id: String,
    name: String,
    arguments: String,
    finished: bool,
}

impl TurnAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one stream event.
    pub fn apply(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::TextDelta { text } => self.text.push_str(&text),
            StreamEvent::ThinkingDelta { text } => self.thinking.push_str(&text),
            StreamEvent::ToolCallStart { id, name } => {
                if self.calls.iter().any(|call| call.id == id) {
                    warn!(%id, "duplicate tool call start, ignoring");
                    return;
                }
                self.calls.push(PartialCall {
                    id,
                    name,
                    arguments: String::new(),
                    finished: false,
                });
            }
            StreamEvent::ToolCallDelta { id, arguments } => {
                match self.calls.iter_mut().find(|call| call.id == id) {
                    Some(call) => call.arguments.push_str(&arguments),
                    None => warn!(%id, "arguments for unknown tool call, ignoring"),
                }
            }
            StreamEvent::ToolCallEnd { id } => {
                match self.calls.iter_mut().find(|call| call.id == id) {
                    Some(call) => call.finished = true,
                    None => warn!(%id, "end for unknown tool call, ignoring"),
                }
            }
            // Usage arrives as a snapshot; the latest one wins.
            StreamEvent::Usage { usage } => self.usage = usage,
            // Errors are the loop's concern; they do not change the turn.
            StreamEvent::Error { .. } => {}
            StreamEvent::Done { stop_reason } => self.stop_reason = Some(stop_reason),
        }
    }

    /// Finalize the turn.
    ///
    /// The stop reason is normalized: an unfinished call at stream end means
    /// the model wants tools regardless of what the provider claimed, and a
    /// provider that reports a plain stop alongside completed calls (Google
    /// does) is corrected to tool use.
    pub fn finish(self) -> CompletedTurn {
        let any_unfinished = self.calls.iter().any(|call| !call.finished);
        let calls: Vec<ToolCall> = self
            .calls
            .into_iter()
            .map(|call| ToolCall::new(call.id, call.name, call.arguments))
            .collect();

        let stop_reason = if any_unfinished {
            StopReason::ToolUse
        } else if !calls.is_empty()
            && matches!(self.stop_reason, None | Some(StopReason::Stop))
        {
            StopReason::ToolUse
        } else {
            self.stop_reason.unwrap_or(StopReason::Stop)
        };

        let mut message = Message::assistant(self.text);
        message.tool_calls = calls;
        if !self.thinking.is_empty() {
            message.thinking = Some(self.thinking);
        }

        CompletedTurn {
            message,
            stop_reason,
            usage: self.usage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn finish_after(events: Vec<StreamEvent>) -> CompletedTurn {
        let mut accumulator = TurnAccumulator::new();
        for event in events {
            accumulator.apply(event);
        }
        accumulator.finish()
    }

    #[test]
    fn text_deltas_concatenate_in_order() {
        let turn = finish_after(vec![
            StreamEvent::TextDelta { text: "Hello ".into() },
            StreamEvent::TextDelta { text: "world".into() },
            StreamEvent::Done { stop_reason: StopReason::Stop },
        ]);

        assert_eq!(turn.message.text(), "Hello world");
        assert_eq!(turn.stop_reason, StopReason::Stop);
        assert!(turn.message.tool_calls.is_empty());
        assert!(turn.message.thinking.is_none());
    }

    #[test]
    fn fragmented_arguments_parse_as_one_object() {
        let turn = finish_after(vec![
            StreamEvent::ToolCallStart { id: "call_1".into(), name: "get_weather".into() },
            StreamEvent::ToolCallDelta { id: "call_1".into(), arguments: "{\"city\":".into() },
            StreamEvent::ToolCallDelta { id: "call_1".into(), arguments: "\"Oslo\"}".into() },
            StreamEvent::ToolCallEnd { id: "call_1".into() },
            StreamEvent::Done { stop_reason: StopReason::ToolUse },
        ]);

        let call = &turn.message.tool_calls[0];
        assert_eq!(call.arguments, "{\"city\":\"Oslo\"}");
        assert_eq!(call.arguments_value(), json!({"city": "Oslo"}));
        assert_eq!(turn.stop_reason, StopReason::ToolUse);
    }

    #[test]
    fn interleaved_calls_keep_fragments_separate() {
        let turn = finish_after(vec![
            StreamEvent::ToolCallStart { id: "a".into(), name: "first".into() },
            StreamEvent::ToolCallStart { id: "b".into(), name: "second".into() },
            StreamEvent::ToolCallDelta { id: "b".into(), arguments: "{\"n\":2}".into() },
            StreamEvent::ToolCallDelta { id: "a".into(), arguments: "{\"n\":1}".into() },
            StreamEvent::ToolCallEnd { id: "a".into() },
            StreamEvent::ToolCallEnd { id: "b".into() },
            StreamEvent::Done { stop_reason: StopReason::ToolUse },
        ]);

        assert_eq!(turn.message.tool_calls.len(), 2);
        assert_eq!(turn.message.tool_calls[0].name, "first");
        assert_eq!(turn.message.tool_calls[0].arguments, "{\"n\":1}");
        assert_eq!(turn.message.tool_calls[1].arguments, "{\"n\":2}");
    }

    #[test]
    fn garbage_arguments_degrade_to_empty_object() {
        let turn = finish_after(vec![
            StreamEvent::ToolCallStart { id: "call_1".into(), name: "ping".into() },
            StreamEvent::ToolCallDelta { id: "call_1".into(), arguments: "not json".into() },
            StreamEvent::ToolCallEnd { id: "call_1".into() },
            StreamEvent::Done { stop_reason: StopReason::ToolUse },
        ]);

        assert_eq!(turn.message.tool_calls[0].arguments_value(), json!({}));
    }

    #[test]
    fn events_for_unknown_ids_are_dropped() {
        let turn = finish_after(vec![
            StreamEvent::ToolCallDelta { id: "ghost".into(), arguments: "{}".into() },
            StreamEvent::ToolCallEnd { id: "ghost".into() },
            StreamEvent::TextDelta { text: "fine".into() },
            StreamEvent::Done { stop_reason: StopReason::Stop },
        ]);

        assert!(turn.message.tool_calls.is_empty());
        assert_eq!(turn.message.text(), "fine");
    }

    #[test]
    fn unfinished_call_forces_tool_use() {
        let turn = finish_after(vec![
            StreamEvent::ToolCallStart { id: "call_1".into(), name: "ping".into() },
            StreamEvent::Done { stop_reason: StopReason::Length },
        ]);

        assert_eq!(turn.stop_reason, StopReason::ToolUse);
        assert_eq!(turn.message.tool_calls.len(), 1);
    }

    #[test]
    fn plain_stop_with_finished_calls_becomes_tool_use() {
        // Google reports STOP on tool-requesting turns.
        let turn = finish_after(vec![
            StreamEvent::ToolCallStart { id: "get_weather-0".into(), name: "get_weather".into() },
            StreamEvent::ToolCallDelta { id: "get_weather-0".into(), arguments: "{}".into() },
            StreamEvent::ToolCallEnd { id: "get_weather-0".into() },
            StreamEvent::Done { stop_reason: StopReason::Stop },
        ]);

        assert_eq!(turn.stop_reason, StopReason::ToolUse);
    }

    #[test]
    fn explicit_length_survives_finished_calls() {
        let turn = finish_after(vec![
            StreamEvent::ToolCallStart { id: "call_1".into(), name: "ping".into() },
            StreamEvent::ToolCallEnd { id: "call_1".into() },
            StreamEvent::Done { stop_reason: StopReason::Length },
        ]);

        assert_eq!(turn.stop_reason, StopReason::Length);
    }

    #[test]
    fn usage_snapshot_replaces_earlier_ones() {
        let turn = finish_after(vec![
            StreamEvent::Usage { usage: Usage::new(3, 1) },
            StreamEvent::Usage { usage: Usage::new(10, 4) },
            StreamEvent::Done { stop_reason: StopReason::Stop },
        ]);

        assert_eq!(turn.usage, Usage::new(10, 4));
    }

    #[test]
    fn thinking_folds_into_the_message() {
        let turn = finish_after(vec![
            StreamEvent::ThinkingDelta { text: "hmm ".into() },
            StreamEvent::ThinkingDelta { text: "ok".into() },
            StreamEvent::TextDelta { text: "answer".into() },
            StreamEvent::Done { stop_reason: StopReason::Stop },
        ]);

        assert_eq!(turn.message.thinking.as_deref(), Some("hmm ok"));
        assert_eq!(turn.message.text(), "answer");
    }

    #[test]
    fn empty_stream_defaults_to_stop() {
        let turn = finish_after(vec![]);

        assert_eq!(turn.stop_reason, StopReason::Stop);
        assert_eq!(turn.message.text(), "");
    }
}
