//! OpenAI Chat Completions protocol adapter.

use std::collections::HashMap;

use futures::StreamExt;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use tracing::trace;

use crate::types::{
    ContentBlock, Context, GenerationSettings, Message, ModelDefinition, Role, StopReason,
    StreamEvent, Usage, WireProtocol,
};

use super::transport::bearer_headers;
use super::{EventStream, PayloadStream, ProtocolAdapter};

pub struct OpenAiCompletionsAdapter;

impl ProtocolAdapter for OpenAiCompletionsAdapter {
    fn protocol(&self) -> WireProtocol {
        WireProtocol::OpenAiCompletions
    }

    fn request_url(&self, model: &ModelDefinition, _api_key: &str) -> String {
        format!("{}/chat/completions", model.base_url)
    }

    fn request_headers(&self, api_key: &str) -> HeaderMap {
        bearer_headers(api_key)
    }

    fn build_request(
        &self,
        context: &Context,
        model: &ModelDefinition,
        settings: &GenerationSettings,
    ) -> serde_json::Value {
        let mut messages: Vec<serde_json::Value> = Vec::new();
        if let Some(ref prompt) = context.system_prompt {
            messages.push(serde_json::json!({ "role": "system", "content": prompt }));
        }
        for message in context.messages() {
            encode_message(message, &mut messages);
        }

        let mut body = serde_json::json!({
            "model": model.id,
            "messages": messages,
            "stream": true,
            "stream_options": { "include_usage": true },
        });
        let obj = body.as_object_mut().unwrap();

        if let Some(temp) = settings.temperature {
            obj.insert("temperature".into(), temp.into());
        }
        if let Some(top_p) = settings.top_p {
            obj.insert("top_p".into(), top_p.into());
        }
        if let Some(max) = settings.max_tokens {
            obj.insert("max_tokens".into(), max.into());
        }

        if !context.tools.is_empty() {
            let tools: Vec<serde_json::Value> = context
                .tools
                .iter()
                .map(|tool| {
                    serde_json::json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.parameters,
                        }
                    })
                })
                .collect();
            obj.insert("tools".into(), tools.into());
        }

        body
    }

    fn parse_events(&self, mut payloads: PayloadStream) -> EventStream {
        let stream = async_stream::stream! {
            // Tool-call deltas are keyed by a choice-local index; the id only
            // appears on the first fragment.
            let mut ids_by_index: HashMap<u32, String> = HashMap::new();
            let mut open_ids: Vec<String> = Vec::new();

            while let Some(payload) = payloads.next().await {
                let data = match payload {
                    Ok(data) => data,
                    Err(err) => {
                        yield StreamEvent::Error { message: err.to_string() };
                        break;
                    }
                };

                let chunk = match serde_json::from_str::<ChatChunk>(&data) {
                    Ok(chunk) => chunk,
                    Err(_) => {
                        trace!(payload = %data, "skipping unparsable stream payload");
                        continue;
                    }
                };

                if let Some(err) = chunk.error {
                    yield StreamEvent::Error { message: err.message };
                    continue;
                }

                if let Some(usage) = chunk.usage {
                    yield StreamEvent::Usage {
                        usage: Usage::new(usage.prompt_tokens, usage.completion_tokens),
                    };
                }

                let Some(choice) = chunk.choices.into_iter().next() else {
                    continue;
                };

                if let Some(text) = choice.delta.content {
                    if !text.is_empty() {
                        yield StreamEvent::TextDelta { text };
                    }
                }

                for call in choice.delta.tool_calls.unwrap_or_default() {
                    let id = match ids_by_index.get(&call.index) {
                        Some(id) => id.clone(),
                        None => {
                            let id = call
                                .id
                                .clone()
                                .unwrap_or_else(|| format!("call_{}", call.index));
                            ids_by_index.insert(call.index, id.clone());
                            open_ids.push(id.clone());
                            let name = call
                                .function
                                .as_ref()
                                .and_then(|f| f.name.clone())
                                .unwrap_or_default();
                            yield StreamEvent::ToolCallStart {
                                id: id.clone(),
                                name,
                            };
                            id
                        }
                    };
                    if let Some(arguments) = call.function.and_then(|f| f.arguments) {
                        if !arguments.is_empty() {
                            yield StreamEvent::ToolCallDelta { id, arguments };
                        }
                    }
                }

                if let Some(reason) = choice.finish_reason.as_deref() {
                    for id in open_ids.drain(..) {
                        yield StreamEvent::ToolCallEnd { id };
                    }
                    yield StreamEvent::Done {
                        stop_reason: parse_finish_reason(reason),
                    };
                    // usage arrives in a trailing chunk, keep draining
                }
            }

            // Stream ended without a finish chunk: close whatever is open so
            // the accumulator still sees well-formed calls.
            for id in open_ids.drain(..) {
                yield StreamEvent::ToolCallEnd { id };
            }
        };
        Box::pin(stream)
    }
}

fn parse_finish_reason(reason: &str) -> StopReason {
    match reason {
        "length" => StopReason::Length,
        "tool_calls" => StopReason::ToolUse,
        "content_filter" => StopReason::Error,
        _ => StopReason::Stop,
    }
}

fn encode_message(message: &Message, out: &mut Vec<serde_json::Value>) {
    // A synthetic tool-result turn becomes one `tool` entry per result.
    if !message.tool_results.is_empty() {
        for result in &message.tool_results {
            out.push(serde_json::json!({
                "role": "tool",
                "tool_call_id": result.tool_call_id,
                "content": result.output,
            }));
        }
        return;
    }

    let role = role_name(message.role);

    if !message.tool_calls.is_empty() {
        let calls: Vec<serde_json::Value> = message
            .tool_calls
            .iter()
            .map(|call| {
                serde_json::json!({
                    "id": call.id,
                    "type": "function",
                    "function": {
                        "name": call.name,
                        "arguments": call.arguments,
                    }
                })
            })
            .collect();
        let text = message.text();
        out.push(serde_json::json!({
            "role": role,
            "content": if text.is_empty() { serde_json::Value::Null } else { serde_json::Value::String(text) },
            "tool_calls": calls,
        }));
        return;
    }

    // Simple single-text message
    if message.content.len() == 1 {
        if let ContentBlock::Text { ref text } = message.content[0] {
            out.push(serde_json::json!({ "role": role, "content": text }));
            return;
        }
    }

    let parts: Vec<serde_json::Value> = message
        .content
        .iter()
        .map(|block| match block {
            ContentBlock::Text { text } => serde_json::json!({
                "type": "text",
                "text": text,
            }),
            ContentBlock::Image(image) => serde_json::json!({
                "type": "image_url",
                "image_url": { "url": image.data_url() },
            }),
        })
        .collect();
    out.push(serde_json::json!({ "role": role, "content": parts }));
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

// Wire chunk shapes (internal)

#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
    error: Option<WireError>,
}

#[derive(Deserialize)]
struct ChatChoice {
    #[serde(default)]
    delta: ChatDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct ChatDelta {
    content: Option<String>,
    tool_calls: Option<Vec<ChatToolCallDelta>>,
}

#[derive(Deserialize)]
struct ChatToolCallDelta {
    index: u32,
    id: Option<String>,
    function: Option<ChatFunctionDelta>,
}

#[derive(Deserialize)]
struct ChatFunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Deserialize)]
struct WireError {
    message: String,
}
