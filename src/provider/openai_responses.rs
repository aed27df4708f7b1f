//! Adapter for the OpenAI Responses wire protocol.
//!
//! Unlike chat completions, the request carries a flat list of typed input
//! items and tool calls stream as `output_item` / `function_call_arguments`
//! events keyed by an item id rather than a choice index.

use std::collections::{HashMap, HashSet};

use async_stream::stream;
use futures::StreamExt;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::trace;

use crate::provider::transport::bearer_headers;
use crate::provider::{EventStream, PayloadStream, ProtocolAdapter};
use crate::types::{
    ContentBlock, Context, GenerationSettings, Message, ModelDefinition, Role, StopReason,
    StreamEvent, Usage, WireProtocol,
};

pub struct OpenAiResponsesAdapter;

impl ProtocolAdapter for OpenAiResponsesAdapter {
    fn protocol(&self) -> WireProtocol {
        WireProtocol::OpenAiResponses
    }

    fn request_url(&self, model: &ModelDefinition, _api_key: &str) -> String {
        format!("{}/responses", model.base_url)
    }

    fn request_headers(&self, api_key: &str) -> HeaderMap {
        bearer_headers(api_key)
    }

    fn build_request(
        &self,
        context: &Context,
        model: &ModelDefinition,
        settings: &GenerationSettings,
    ) -> Value {
        let mut input = Vec::new();
        if let Some(prompt) = &context.system_prompt {
            input.push(json!({ "role": "system", "content": prompt }));
        }
        for message in context.messages() {
            encode_message(message, &mut input);
        }

        let mut body = json!({
            "model": model.id,
            "input": input,
            "stream": true,
        });
        let obj = body.as_object_mut().unwrap();
        if let Some(max_tokens) = settings.max_tokens {
            obj.insert("max_output_tokens".into(), json!(max_tokens));
        }
        if let Some(temperature) = settings.temperature {
            obj.insert("temperature".into(), json!(temperature));
        }
        if let Some(top_p) = settings.top_p {
            obj.insert("top_p".into(), json!(top_p));
        }
        if model.capabilities.reasoning {
            // Summaries are what the stream surfaces as thinking deltas.
            obj.insert("reasoning".into(), json!({ "summary": "auto" }));
        }
        if !context.tools.is_empty() {
            let tools: Vec<Value> = context
                .tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                        "strict": false,
                    })
                })
                .collect();
            obj.insert("tools".into(), json!(tools));
        }
        body
    }

    fn parse_events(&self, payloads: PayloadStream) -> EventStream {
        stream! {
            let mut payloads = payloads;
            // Argument deltas are keyed by item id, results by call id.
            let mut call_ids_by_item: HashMap<String, String> = HashMap::new();
            let mut streamed_arguments: HashSet<String> = HashSet::new();
            let mut open_ids: Vec<String> = Vec::new();
            let mut saw_tool_call = false;

            while let Some(payload) = payloads.next().await {
                let payload = match payload {
                    Ok(payload) => payload,
                    Err(err) => {
                        yield StreamEvent::Error { message: err.to_string() };
                        break;
                    }
                };
                let event: WireEvent = match serde_json::from_str(&payload) {
                    Ok(event) => event,
                    Err(_) => {
                        trace!(%payload, "skipping unparsable stream payload");
                        continue;
                    }
                };

                match event {
                    WireEvent::OutputItemAdded { item } => {
                        if item.kind != "function_call" {
                            continue;
                        }
                        let Some(name) = item.name else { continue };
                        let call_id = match item.call_id.or_else(|| item.item_id.clone()) {
                            Some(id) => id,
                            None => continue,
                        };
                        if let Some(item_id) = item.item_id {
                            call_ids_by_item.insert(item_id, call_id.clone());
                        }
                        open_ids.push(call_id.clone());
                        saw_tool_call = true;
                        yield StreamEvent::ToolCallStart { id: call_id, name };
                    }
                    WireEvent::FunctionArgumentsDelta { item_id, delta } => {
                        let Some(call_id) = call_ids_by_item.get(&item_id) else {
                            continue;
                        };
                        streamed_arguments.insert(call_id.clone());
                        yield StreamEvent::ToolCallDelta {
                            id: call_id.clone(),
                            arguments: delta,
                        };
                    }
                    WireEvent::OutputItemDone { item } => {
                        if item.kind != "function_call" {
                            continue;
                        }
                        let call_id = item.call_id.or_else(|| {
                            item.item_id
                                .and_then(|id| call_ids_by_item.get(&id).cloned())
                        });
                        let Some(call_id) = call_id else { continue };
                        // Some models skip argument deltas and deliver the
                        // full string only on the final item.
                        if !streamed_arguments.contains(&call_id) {
                            if let Some(arguments) =
                                item.arguments.filter(|args| !args.is_empty())
                            {
                                yield StreamEvent::ToolCallDelta {
                                    id: call_id.clone(),
                                    arguments,
                                };
                            }
                        }
                        if let Some(position) = open_ids.iter().position(|id| id == &call_id) {
                            open_ids.remove(position);
                            yield StreamEvent::ToolCallEnd { id: call_id };
                        }
                    }
                    WireEvent::OutputTextDelta { delta } => {
                        if !delta.is_empty() {
                            yield StreamEvent::TextDelta { text: delta };
                        }
                    }
                    WireEvent::ReasoningSummaryDelta { delta } => {
                        if !delta.is_empty() {
                            yield StreamEvent::ThinkingDelta { text: delta };
                        }
                    }
                    WireEvent::Completed { response } | WireEvent::Incomplete { response } => {
                        if let Some(usage) = response.usage {
                            yield StreamEvent::Usage {
                                usage: Usage::new(usage.input_tokens, usage.output_tokens),
                            };
                        }
                        for id in open_ids.drain(..) {
                            yield StreamEvent::ToolCallEnd { id };
                        }
                        let stop_reason = if saw_tool_call {
                            StopReason::ToolUse
                        } else {
                            parse_status(response.status.as_deref())
                        };
                        yield StreamEvent::Done { stop_reason };
                    }
                    WireEvent::Failed { response } => {
                        let message = response
                            .error
                            .map(|err| err.message)
                            .unwrap_or_else(|| "response failed".to_string());
                        yield StreamEvent::Error { message };
                        yield StreamEvent::Done { stop_reason: StopReason::Error };
                    }
                    WireEvent::Error { message } => {
                        yield StreamEvent::Error {
                            message: message.unwrap_or_else(|| "provider error".to_string()),
                        };
                    }
                    WireEvent::Other => {}
                }
            }

            // Close calls still open when the stream ends early.
            for id in open_ids {
                yield StreamEvent::ToolCallEnd { id };
            }
        }
        .boxed()
    }
}

fn parse_status(status: Option<&str>) -> StopReason {
    match status {
        Some("incomplete") => StopReason::Length,
        Some("failed") => StopReason::Error,
        // completed
        _ => StopReason::Stop,
    }
}

fn encode_message(message: &Message, input: &mut Vec<Value>) {
    if !message.tool_results.is_empty() {
        for result in &message.tool_results {
            input.push(json!({
                "type": "function_call_output",
                "call_id": result.tool_call_id,
                "output": result.output,
            }));
        }
        return;
    }

    match message.role {
        Role::System | Role::User => {
            let role = if message.role == Role::System {
                "system"
            } else {
                "user"
            };
            input.push(json!({
                "role": role,
                "content": encode_user_content(message),
            }));
        }
        Role::Assistant => {
            let text = message.text();
            if !text.is_empty() {
                input.push(json!({
                    "role": "assistant",
                    "content": [{ "type": "output_text", "text": text }],
                }));
            }
            for call in &message.tool_calls {
                input.push(json!({
                    "type": "function_call",
                    "call_id": call.id,
                    "name": call.name,
                    "arguments": call.arguments,
                }));
            }
        }
    }
}

fn encode_user_content(message: &Message) -> Value {
    if let [ContentBlock::Text { text }] = message.content.as_slice() {
        return json!(text);
    }
    let parts: Vec<Value> = message
        .content
        .iter()
        .map(|block| match block {
            ContentBlock::Text { text } => json!({ "type": "input_text", "text": text }),
            ContentBlock::Image(image) => json!({
                "type": "input_image",
                "image_url": image.data_url(),
            }),
        })
        .collect();
    json!(parts)
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum WireEvent {
    #[serde(rename = "response.output_item.added")]
    OutputItemAdded { item: WireItem },
    #[serde(rename = "response.output_item.done")]
    OutputItemDone { item: WireItem },
    #[serde(rename = "response.output_text.delta")]
    OutputTextDelta { delta: String },
    #[serde(rename = "response.reasoning_summary_text.delta")]
    ReasoningSummaryDelta { delta: String },
    #[serde(rename = "response.function_call_arguments.delta")]
    FunctionArgumentsDelta { item_id: String, delta: String },
    #[serde(rename = "response.completed")]
    Completed { response: WireResponse },
    #[serde(rename = "response.incomplete")]
    Incomplete { response: WireResponse },
    #[serde(rename = "response.failed")]
    Failed { response: WireResponse },
    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        message: Option<String>,
    },
    // response.created, argument done markers, future event kinds
    #[serde(other)]
    Other,
}

#[derive(Deserialize, Default)]
struct WireItem {
    #[serde(rename = "id", default)]
    item_id: Option<String>,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    call_id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Deserialize, Default)]
struct WireResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    usage: Option<WireUsage>,
    #[serde(default)]
    error: Option<WireError>,
}

#[derive(Deserialize)]
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ToolCall, ToolDefinition, ToolResult};
    use futures::stream;
    use pretty_assertions::assert_eq;

    fn adapter() -> OpenAiResponsesAdapter {
        OpenAiResponsesAdapter
    }

    fn model() -> ModelDefinition {
        crate::catalog::find_model("gpt-5").unwrap()
    }

    async fn events_from(payloads: &[&str]) -> Vec<StreamEvent> {
        let payloads = stream::iter(
            payloads
                .iter()
                .map(|payload| Ok(payload.to_string()))
                .collect::<Vec<_>>(),
        )
        .boxed();
        adapter().parse_events(payloads).collect().await
    }

    #[test]
    fn history_becomes_typed_input_items() {
        let mut context = Context::new().with_system_prompt("be brief");
        context.push_message(Message::user("hi"));
        let mut assistant = Message::assistant("checking");
        assistant
            .tool_calls
            .push(ToolCall::new("call_1", "get_weather", r#"{"city":"Oslo"}"#));
        context.push_message(assistant);
        context.push_message(Message::tool_results(vec![ToolResult::ok(
            "call_1", "rainy",
        )]));

        let body = adapter().build_request(&context, &model(), &GenerationSettings::default());
        let input = body["input"].as_array().unwrap();
        assert_eq!(input.len(), 5);
        assert_eq!(input[0]["role"], "system");
        assert_eq!(input[1]["content"], "hi");
        assert_eq!(input[2]["content"][0]["type"], "output_text");
        assert_eq!(input[3]["type"], "function_call");
        assert_eq!(input[3]["call_id"], "call_1");
        assert_eq!(input[3]["arguments"], r#"{"city":"Oslo"}"#);
        assert_eq!(input[4]["type"], "function_call_output");
        assert_eq!(input[4]["output"], "rainy");
    }

    #[test]
    fn tools_use_flat_function_shape() {
        let context = Context::new().with_tools(vec![ToolDefinition {
            name: "search".into(),
            description: "Find things".into(),
            parameters: json!({ "type": "object" }),
        }]);

        let body = adapter().build_request(&context, &model(), &GenerationSettings::default());
        assert_eq!(body["tools"][0]["name"], "search");
        assert_eq!(body["tools"][0]["strict"], false);
        assert!(body["tools"][0].get("function").is_none());
    }

    #[test]
    fn max_tokens_maps_to_max_output_tokens() {
        let settings = GenerationSettings::builder().max_tokens(256).build();
        let body = adapter().build_request(&Context::new(), &model(), &settings);
        assert_eq!(body["max_output_tokens"], 256);
        assert!(body.get("max_tokens").is_none());
    }

    #[tokio::test]
    async fn text_deltas_and_completion_stream_through() {
        let events = events_from(&[
            r#"{"type":"response.created","response":{"id":"resp_1"}}"#,
            r#"{"type":"response.output_text.delta","delta":"Hel"}"#,
            r#"{"type":"response.output_text.delta","delta":"lo"}"#,
            r#"{"type":"response.completed","response":{"status":"completed","usage":{"input_tokens":7,"output_tokens":2}}}"#,
        ])
        .await;

        assert_eq!(
            events,
            vec![
                StreamEvent::TextDelta { text: "Hel".into() },
                StreamEvent::TextDelta { text: "lo".into() },
                StreamEvent::Usage { usage: Usage::new(7, 2) },
                StreamEvent::Done { stop_reason: StopReason::Stop },
            ]
        );
    }

    #[tokio::test]
    async fn function_call_items_stream_as_call_events() {
        let events = events_from(&[
            r#"{"type":"response.output_item.added","item":{"id":"item_1","type":"function_call","call_id":"call_9","name":"get_weather","arguments":""}}"#,
            r#"{"type":"response.function_call_arguments.delta","item_id":"item_1","delta":"{\"city\":"}"#,
            r#"{"type":"response.function_call_arguments.delta","item_id":"item_1","delta":"\"Oslo\"}"}"#,
            r#"{"type":"response.output_item.done","item":{"id":"item_1","type":"function_call","call_id":"call_9","name":"get_weather","arguments":"{\"city\":\"Oslo\"}"}}"#,
            r#"{"type":"response.completed","response":{"status":"completed"}}"#,
        ])
        .await;

        assert_eq!(
            events,
            vec![
                StreamEvent::ToolCallStart { id: "call_9".into(), name: "get_weather".into() },
                StreamEvent::ToolCallDelta { id: "call_9".into(), arguments: "{\"city\":".into() },
                StreamEvent::ToolCallDelta { id: "call_9".into(), arguments: "\"Oslo\"}".into() },
                StreamEvent::ToolCallEnd { id: "call_9".into() },
                StreamEvent::Done { stop_reason: StopReason::ToolUse },
            ]
        );
    }

    #[tokio::test]
    async fn undelivered_arguments_arrive_with_the_final_item() {
        let events = events_from(&[
            r#"{"type":"response.output_item.added","item":{"id":"item_1","type":"function_call","call_id":"call_9","name":"ping"}}"#,
            r#"{"type":"response.output_item.done","item":{"id":"item_1","type":"function_call","call_id":"call_9","name":"ping","arguments":"{}"}}"#,
        ])
        .await;

        assert_eq!(
            events,
            vec![
                StreamEvent::ToolCallStart { id: "call_9".into(), name: "ping".into() },
                StreamEvent::ToolCallDelta { id: "call_9".into(), arguments: "{}".into() },
                StreamEvent::ToolCallEnd { id: "call_9".into() },
            ]
        );
    }

    #[tokio::test]
    async fn reasoning_summary_becomes_thinking() {
        let events = events_from(&[
            r#"{"type":"response.reasoning_summary_text.delta","delta":"weighing options"}"#,
            r#"{"type":"response.incomplete","response":{"status":"incomplete"}}"#,
        ])
        .await;

        assert_eq!(
            events,
            vec![
                StreamEvent::ThinkingDelta { text: "weighing options".into() },
                StreamEvent::Done { stop_reason: StopReason::Length },
            ]
        );
    }

    #[tokio::test]
    async fn failed_response_surfaces_error_stop() {
        let events = events_from(&[
            r#"{"type":"response.failed","response":{"status":"failed","error":{"code":"server_error","message":"backend unavailable"}}}"#,
        ])
        .await;

        assert_eq!(
            events,
            vec![
                StreamEvent::Error { message: "backend unavailable".into() },
                StreamEvent::Done { stop_reason: StopReason::Error },
            ]
        );
    }

    #[tokio::test]
    async fn truncated_stream_closes_open_calls() {
        let events = events_from(&[
            r#"{"type":"response.output_item.added","item":{"id":"item_1","type":"function_call","call_id":"call_9","name":"get_weather"}}"#,
        ])
        .await;

        assert_eq!(
            events,
            vec![
                StreamEvent::ToolCallStart { id: "call_9".into(), name: "get_weather".into() },
                StreamEvent::ToolCallEnd { id: "call_9".into() },
            ]
        );
    }
}
