//! Anthropic Messages protocol adapter.

use std::collections::HashMap;

use futures::StreamExt;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use tracing::trace;

use crate::types::{
    ContentBlock, Context, GenerationSettings, Message, ModelDefinition, Role, StopReason,
    StreamEvent, Usage, WireProtocol,
};

use super::transport::anthropic_headers;
use super::{EventStream, PayloadStream, ProtocolAdapter};

const API_VERSION: &str = "2023-06-01";

pub struct AnthropicMessagesAdapter;

impl ProtocolAdapter for AnthropicMessagesAdapter {
    fn protocol(&self) -> WireProtocol {
        WireProtocol::AnthropicMessages
    }

    fn request_url(&self, model: &ModelDefinition, _api_key: &str) -> String {
        format!("{}/messages", model.base_url)
    }

    fn request_headers(&self, api_key: &str) -> HeaderMap {
        anthropic_headers(api_key, API_VERSION)
    }

    fn build_request(
        &self,
        context: &Context,
        model: &ModelDefinition,
        settings: &GenerationSettings,
    ) -> serde_json::Value {
        let mut system_parts: Vec<String> = Vec::new();
        if let Some(ref prompt) = context.system_prompt {
            system_parts.push(prompt.clone());
        }

        let mut messages: Vec<serde_json::Value> = Vec::new();
        for message in context.messages() {
            encode_message(message, &mut messages, &mut system_parts);
        }

        // max_tokens is mandatory on this protocol.
        let max_tokens = settings.max_tokens.unwrap_or(model.max_output_tokens);

        let mut body = serde_json::json!({
            "model": model.id,
            "messages": messages,
            "max_tokens": max_tokens,
            "stream": true,
        });
        let obj = body.as_object_mut().unwrap();

        if !system_parts.is_empty() {
            obj.insert("system".into(), system_parts.join("\n").into());
        }
        if let Some(temp) = settings.temperature {
            obj.insert("temperature".into(), temp.into());
        }
        if let Some(top_p) = settings.top_p {
            obj.insert("top_p".into(), top_p.into());
        }

        if !context.tools.is_empty() {
            let tools: Vec<serde_json::Value> = context
                .tools
                .iter()
                .map(|tool| {
                    serde_json::json!({
                        "name": tool.name,
                        "description": tool.description,
                        "input_schema": tool.parameters,
                    })
                })
                .collect();
            obj.insert("tools".into(), tools.into());
        }

        body
    }

    fn parse_events(&self, mut payloads: PayloadStream) -> EventStream {
        let stream = async_stream::stream! {
            // Blocks are addressed by index; tool ids only appear on the
            // block's start event.
            let mut tool_ids_by_index: HashMap<u32, String> = HashMap::new();
            let mut open_ids: Vec<String> = Vec::new();
            let mut input_tokens: u32 = 0;

            while let Some(payload) = payloads.next().await {
                let data = match payload {
                    Ok(data) => data,
                    Err(err) => {
                        yield StreamEvent::Error { message: err.to_string() };
                        break;
                    }
                };

                let event = match serde_json::from_str::<WireEvent>(&data) {
                    Ok(event) => event,
                    Err(_) => {
                        trace!(payload = %data, "skipping unparsable stream payload");
                        continue;
                    }
                };

                match event {
                    WireEvent::MessageStart { message } => {
                        if let Some(usage) = message.usage {
                            input_tokens = usage.input_tokens;
                        }
                    }
                    WireEvent::ContentBlockStart {
                        index,
                        content_block,
                    } => {
                        if let WireBlock::ToolUse { id, name } = content_block {
                            tool_ids_by_index.insert(index, id.clone());
                            open_ids.push(id.clone());
                            yield StreamEvent::ToolCallStart { id, name };
                        }
                    }
                    WireEvent::ContentBlockDelta { index, delta } => match delta {
                        WireDelta::TextDelta { text } => {
                            yield StreamEvent::TextDelta { text };
                        }
                        WireDelta::ThinkingDelta { thinking } => {
                            yield StreamEvent::ThinkingDelta { text: thinking };
                        }
                        WireDelta::InputJsonDelta { partial_json } => {
                            if !partial_json.is_empty() {
                                if let Some(id) = tool_ids_by_index.get(&index) {
                                    yield StreamEvent::ToolCallDelta {
                                        id: id.clone(),
                                        arguments: partial_json,
                                    };
                                }
                            }
                        }
                        WireDelta::Other => {}
                    },
                    WireEvent::ContentBlockStop { index } => {
                        if let Some(id) = tool_ids_by_index.remove(&index) {
                            open_ids.retain(|open| open != &id);
                            yield StreamEvent::ToolCallEnd { id };
                        }
                    }
                    WireEvent::MessageDelta { delta, usage } => {
                        if let Some(usage) = usage {
                            yield StreamEvent::Usage {
                                usage: Usage::new(input_tokens, usage.output_tokens),
                            };
                        }
                        if let Some(reason) = delta.stop_reason.as_deref() {
                            for id in open_ids.drain(..) {
                                yield StreamEvent::ToolCallEnd { id };
                            }
                            yield StreamEvent::Done {
                                stop_reason: parse_stop_reason(reason),
                            };
                        }
                    }
                    WireEvent::Error { error } => {
                        yield StreamEvent::Error {
                            message: error.message,
                        };
                    }
                    WireEvent::Other => {}
                }
            }

            for id in open_ids.drain(..) {
                yield StreamEvent::ToolCallEnd { id };
            }
        };
        Box::pin(stream)
    }
}

fn parse_stop_reason(reason: &str) -> StopReason {
    match reason {
        "max_tokens" => StopReason::Length,
        "tool_use" => StopReason::ToolUse,
        "refusal" => StopReason::Error,
        // end_turn, stop_sequence
        _ => StopReason::Stop,
    }
}

fn encode_message(
    message: &Message,
    out: &mut Vec<serde_json::Value>,
    system_parts: &mut Vec<String>,
) {
    // All of a turn's tool results fold into one user message.
    if !message.tool_results.is_empty() {
        let blocks: Vec<serde_json::Value> = message
            .tool_results
            .iter()
            .map(|result| {
                serde_json::json!({
                    "type": "tool_result",
                    "tool_use_id": result.tool_call_id,
                    "content": result.output,
                    "is_error": result.is_error,
                })
            })
            .collect();
        out.push(serde_json::json!({ "role": "user", "content": blocks }));
        return;
    }

    match message.role {
        // System text rides in the top-level field, never the message array.
        Role::System => system_parts.push(message.text()),
        Role::User => {
            out.push(serde_json::json!({
                "role": "user",
                "content": encode_content(&message.content),
            }));
        }
        Role::Assistant => {
            if message.tool_calls.is_empty() {
                let text = message.text();
                if !text.is_empty() {
                    out.push(serde_json::json!({ "role": "assistant", "content": text }));
                }
                return;
            }
            let mut blocks: Vec<serde_json::Value> = Vec::new();
            let text = message.text();
            if !text.is_empty() {
                blocks.push(serde_json::json!({ "type": "text", "text": text }));
            }
            for call in &message.tool_calls {
                blocks.push(serde_json::json!({
                    "type": "tool_use",
                    "id": call.id,
                    "name": call.name,
                    "input": call.arguments_value(),
                }));
            }
            out.push(serde_json::json!({ "role": "assistant", "content": blocks }));
        }
    }
}

fn encode_content(blocks: &[ContentBlock]) -> serde_json::Value {
    if blocks.len() == 1 {
        if let ContentBlock::Text { ref text } = blocks[0] {
            return serde_json::Value::String(text.clone());
        }
    }

    let parts: Vec<serde_json::Value> = blocks
        .iter()
        .map(|block| match block {
            ContentBlock::Text { text } => serde_json::json!({
                "type": "text",
                "text": text,
            }),
            ContentBlock::Image(image) => serde_json::json!({
                "type": "image",
                "source": {
                    "type": "base64",
                    "media_type": image.mime_type,
                    "data": image.data,
                }
            }),
        })
        .collect();
    serde_json::json!(parts)
}

// Wire event shapes (internal)

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireEvent {
    MessageStart {
        message: WireMessageStart,
    },
    ContentBlockStart {
        index: u32,
        content_block: WireBlock,
    },
    ContentBlockDelta {
        index: u32,
        delta: WireDelta,
    },
    ContentBlockStop {
        index: u32,
    },
    MessageDelta {
        delta: WireStop,
        #[serde(default)]
        usage: Option<WireUsage>,
    },
    Error {
        error: WireError,
    },
    // ping, message_stop, future event kinds
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct WireMessageStart {
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireBlock {
    ToolUse { id: String, name: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireDelta {
    TextDelta { text: String },
    ThinkingDelta { thinking: String },
    InputJsonDelta { partial_json: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct WireStop {
    stop_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct WireUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[derive(Deserialize)]
struct WireError {
    message: String,
}
