//! Protocol adapters and the provider seam used by the agent loop.
//!
//! Each supported wire protocol gets one [`ProtocolAdapter`]: a request
//! builder plus a stream decoder producing normalized [`StreamEvent`]s. The
//! adapter set is closed; selection is a total match on [`WireProtocol`].

pub mod anthropic;
pub mod google;
pub mod openai;
pub mod openai_responses;
pub mod transport;

use async_trait::async_trait;
use futures::stream::BoxStream;
use reqwest::header::HeaderMap;
use tokio_util::sync::CancellationToken;

use crate::error::ColloquyError;
use crate::types::{Context, GenerationSettings, ModelDefinition, StreamEvent, WireProtocol};
use transport::{payload_stream, shared_client, status_to_error, StreamFraming};

/// Framed payload strings handed to an adapter's parser.
pub type PayloadStream = BoxStream<'static, Result<String, ColloquyError>>;

/// Normalized events produced by an adapter's parser.
pub type EventStream = BoxStream<'static, StreamEvent>;

/// One wire protocol's request builder and stream decoder.
///
/// Adapters are stateless; all per-turn parse state lives inside the stream
/// returned by [`ProtocolAdapter::parse_events`].
pub trait ProtocolAdapter: Send + Sync {
    /// The protocol this adapter speaks.
    fn protocol(&self) -> WireProtocol;

    /// Full endpoint URL for a streaming request.
    fn request_url(&self, model: &ModelDefinition, api_key: &str) -> String;

    /// Auth and content-type headers.
    fn request_headers(&self, api_key: &str) -> HeaderMap;

    /// Framing of the response body.
    fn framing(&self) -> StreamFraming {
        StreamFraming::Sse
    }

    /// Build the outbound JSON body from the conversation state.
    fn build_request(
        &self,
        context: &Context,
        model: &ModelDefinition,
        settings: &GenerationSettings,
    ) -> serde_json::Value;

    /// Decode framed payloads into normalized stream events.
    fn parse_events(&self, payloads: PayloadStream) -> EventStream;
}

/// Select the adapter for a protocol tag.
pub fn adapter_for(protocol: WireProtocol) -> Box<dyn ProtocolAdapter> {
    match protocol {
        WireProtocol::OpenAiCompletions => Box::new(openai::OpenAiCompletionsAdapter),
        WireProtocol::OpenAiResponses => Box::new(openai_responses::OpenAiResponsesAdapter),
        WireProtocol::AnthropicMessages => Box::new(anthropic::AnthropicMessagesAdapter),
        WireProtocol::GoogleGenerateContent => Box::new(google::GoogleGenerateContentAdapter),
    }
}

/// The agent loop's view of a model: one streamed turn at a time.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Open one streaming turn.
    ///
    /// An `Err` here is a request-level failure (network, non-success
    /// status); once a stream is returned, every later failure travels
    /// through the events themselves.
    async fn stream_turn(
        &self,
        context: &Context,
        settings: &GenerationSettings,
        cancel: CancellationToken,
    ) -> Result<EventStream, ColloquyError>;
}

/// Production provider: adapter + shared HTTP client + payload parser.
pub struct HttpModelProvider {
    model: ModelDefinition,
    api_key: String,
    adapter: Box<dyn ProtocolAdapter>,
}

impl HttpModelProvider {
    pub fn new(model: ModelDefinition, api_key: impl Into<String>) -> Self {
        let adapter = adapter_for(model.protocol);
        Self {
            model,
            api_key: api_key.into(),
            adapter,
        }
    }

    pub fn model(&self) -> &ModelDefinition {
        &self.model
    }
}

#[async_trait]
impl ModelProvider for HttpModelProvider {
    async fn stream_turn(
        &self,
        context: &Context,
        settings: &GenerationSettings,
        cancel: CancellationToken,
    ) -> Result<EventStream, ColloquyError> {
        let body = self.adapter.build_request(context, &self.model, settings);
        let url = self.adapter.request_url(&self.model, &self.api_key);
        tracing::debug!(
            model = %self.model.id,
            messages = context.messages().len(),
            tools = context.tools.len(),
            "sending streaming request"
        );

        let response = shared_client()
            .post(&url)
            .headers(self.adapter.request_headers(&self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_to_error(status.as_u16(), &body));
        }

        let payloads = payload_stream(response.bytes_stream(), self.adapter.framing(), cancel);
        Ok(self.adapter.parse_events(payloads))
    }
}
