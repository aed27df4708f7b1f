//! Google generateContent protocol adapter.
//!
//! The streaming endpoint returns a JSON pseudo-array rather than SSE, and
//! the wire format carries no tool-call ids, so this adapter synthesizes
//! `{name}-{sequence}` ids for internal tracking and maps them back to plain
//! function names when encoding results.

use std::collections::HashMap;

use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::Deserialize;
use tracing::trace;

use crate::types::{
    ContentBlock, Context, GenerationSettings, Message, ModelDefinition, Role, StopReason,
    StreamEvent, Usage, WireProtocol,
};

use super::transport::StreamFraming;
use super::{EventStream, PayloadStream, ProtocolAdapter};

pub struct GoogleGenerateContentAdapter;

impl ProtocolAdapter for GoogleGenerateContentAdapter {
    fn protocol(&self) -> WireProtocol {
        WireProtocol::GoogleGenerateContent
    }

    fn request_url(&self, model: &ModelDefinition, api_key: &str) -> String {
        format!(
            "{}/models/{}:streamGenerateContent?key={}",
            model.base_url, model.id, api_key
        )
    }

    // The key rides in the query string, not a header.
    fn request_headers(&self, _api_key: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    fn framing(&self) -> StreamFraming {
        StreamFraming::JsonArray
    }

    fn build_request(
        &self,
        context: &Context,
        model: &ModelDefinition,
        settings: &GenerationSettings,
    ) -> serde_json::Value {
        let mut system_parts: Vec<serde_json::Value> = Vec::new();
        if let Some(ref prompt) = context.system_prompt {
            system_parts.push(serde_json::json!({ "text": prompt }));
        }

        // Synthetic ids do not exist on this wire; results are keyed back to
        // the function name recorded when the call was encoded.
        let mut call_names: HashMap<String, String> = HashMap::new();
        let mut contents: Vec<serde_json::Value> = Vec::new();

        for message in context.messages() {
            if !message.tool_results.is_empty() {
                let parts: Vec<serde_json::Value> = message
                    .tool_results
                    .iter()
                    .map(|result| {
                        let name = call_names
                            .get(&result.tool_call_id)
                            .cloned()
                            .unwrap_or_else(|| result.tool_call_id.clone());
                        serde_json::json!({
                            "functionResponse": {
                                "name": name,
                                "response": { "output": result.output },
                            }
                        })
                    })
                    .collect();
                contents.push(serde_json::json!({ "role": "user", "parts": parts }));
                continue;
            }

            match message.role {
                Role::System => {
                    system_parts.push(serde_json::json!({ "text": message.text() }));
                }
                Role::User => {
                    contents.push(serde_json::json!({
                        "role": "user",
                        "parts": encode_parts(&message.content),
                    }));
                }
                Role::Assistant => {
                    let mut parts: Vec<serde_json::Value> = Vec::new();
                    let text = message.text();
                    if !text.is_empty() {
                        parts.push(serde_json::json!({ "text": text }));
                    }
                    for call in &message.tool_calls {
                        call_names.insert(call.id.clone(), call.name.clone());
                        parts.push(serde_json::json!({
                            "functionCall": {
                                "name": call.name,
                                "args": call.arguments_value(),
                            }
                        }));
                    }
                    if !parts.is_empty() {
                        contents.push(serde_json::json!({ "role": "model", "parts": parts }));
                    }
                }
            }
        }

        let mut body = serde_json::json!({ "contents": contents });
        let obj = body.as_object_mut().unwrap();

        if !system_parts.is_empty() {
            obj.insert(
                "systemInstruction".into(),
                serde_json::json!({ "parts": system_parts }),
            );
        }

        let mut gen_config = serde_json::Map::new();
        if let Some(max) = settings.max_tokens {
            gen_config.insert("maxOutputTokens".into(), max.into());
        }
        if let Some(temp) = settings.temperature {
            gen_config.insert("temperature".into(), temp.into());
        }
        if let Some(top_p) = settings.top_p {
            gen_config.insert("topP".into(), top_p.into());
        }
        if !gen_config.is_empty() {
            obj.insert(
                "generationConfig".into(),
                serde_json::Value::Object(gen_config),
            );
        }

        if !context.tools.is_empty() {
            let declarations: Vec<serde_json::Value> = context
                .tools
                .iter()
                .map(|tool| {
                    serde_json::json!({
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    })
                })
                .collect();
            obj.insert(
                "tools".into(),
                serde_json::json!([{ "functionDeclarations": declarations }]),
            );
        }

        body
    }

    fn parse_events(&self, mut payloads: PayloadStream) -> EventStream {
        let stream = async_stream::stream! {
            let mut call_seq: u32 = 0;

            while let Some(payload) = payloads.next().await {
                let data = match payload {
                    Ok(data) => data,
                    Err(err) => {
                        yield StreamEvent::Error { message: err.to_string() };
                        break;
                    }
                };

                let chunk = match serde_json::from_str::<GenerateChunk>(&data) {
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

                let candidate = match chunk.candidates.into_iter().next() {
                    Some(candidate) => candidate,
                    None => {
                        if let Some(reason) = chunk
                            .prompt_feedback
                            .and_then(|feedback| feedback.block_reason)
                        {
                            yield StreamEvent::Error {
                                message: format!("prompt blocked: {reason}"),
                            };
                            yield StreamEvent::Done {
                                stop_reason: StopReason::Error,
                            };
                        }
                        continue;
                    }
                };

                for part in candidate.content.unwrap_or_default().parts {
                    if let Some(text) = part.text {
                        if text.is_empty() {
                            continue;
                        }
                        if part.thought {
                            yield StreamEvent::ThinkingDelta { text };
                        } else {
                            yield StreamEvent::TextDelta { text };
                        }
                    } else if let Some(call) = part.function_call {
                        // Complete calls arrive in one part; emit the whole
                        // start/delta/end trio under a synthesized id.
                        let id = format!("{}-{}", call.name, call_seq);
                        call_seq += 1;
                        let arguments = call
                            .args
                            .map(|args| args.to_string())
                            .unwrap_or_else(|| "{}".to_string());
                        yield StreamEvent::ToolCallStart {
                            id: id.clone(),
                            name: call.name,
                        };
                        yield StreamEvent::ToolCallDelta {
                            id: id.clone(),
                            arguments,
                        };
                        yield StreamEvent::ToolCallEnd { id };
                    }
                }

                if let Some(reason) = candidate.finish_reason.as_deref() {
                    if let Some(usage) = chunk.usage_metadata {
                        yield StreamEvent::Usage {
                            usage: Usage::new(
                                usage.prompt_token_count,
                                usage.candidates_token_count,
                            ),
                        };
                    }
                    yield StreamEvent::Done {
                        stop_reason: parse_finish_reason(reason),
                    };
                }
            }
        };
        Box::pin(stream)
    }
}

fn parse_finish_reason(reason: &str) -> StopReason {
    match reason {
        "MAX_TOKENS" => StopReason::Length,
        "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" => StopReason::Error,
        // STOP; tool-requesting turns also end with STOP and are normalized
        // by the accumulator.
        _ => StopReason::Stop,
    }
}

fn encode_parts(blocks: &[ContentBlock]) -> Vec<serde_json::Value> {
    blocks
        .iter()
        .map(|block| match block {
            ContentBlock::Text { text } => serde_json::json!({ "text": text }),
            ContentBlock::Image(image) => serde_json::json!({
                "inlineData": {
                    "mimeType": image.mime_type,
                    "data": image.data,
                }
            }),
        })
        .collect()
}

// Wire chunk shapes (internal)

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateChunk {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
    usage_metadata: Option<WireUsage>,
    prompt_feedback: Option<WireFeedback>,
    error: Option<WireError>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCandidate {
    content: Option<WireContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct WireContent {
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
    function_call: Option<WireFunctionCall>,
}

#[derive(Deserialize)]
struct WireFunctionCall {
    name: String,
    args: Option<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct WireError {
    message: String,
}
