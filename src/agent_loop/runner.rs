//! The bounded tool-calling loop and its public handle.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::error::ColloquyError;
use crate::provider::{HttpModelProvider, ModelProvider};
use crate::tools::{validate_arguments, Tool};
use crate::types::{
    AgentEvent, Context, GenerationSettings, Message, ModelDefinition, StreamEvent, ToolCall,
    ToolResult, Usage,
};

use super::accumulator::TurnAccumulator;
use super::types::{AgentOutcome, RunId};

/// Default bound on provider round-trips per run.
pub const DEFAULT_MAX_ITERATIONS: usize = 20;

/// Output markers distinguishing dispatch failures from tool-reported ones.
pub const UNKNOWN_TOOL: &str = "UNKNOWN_TOOL";
pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
pub const EXECUTION_ERROR: &str = "EXECUTION_ERROR";

/// Builds the provider for a run; swapped for a stub in loop tests.
pub type ProviderFactory =
    Arc<dyn Fn(&AgentRequest) -> Result<Arc<dyn ModelProvider>, ColloquyError> + Send + Sync>;

/// Everything needed to start a run.
pub struct AgentRequest {
    pub run_id: RunId,
    pub model: ModelDefinition,
    pub context: Context,
    pub tools: Vec<Arc<dyn Tool>>,
    pub api_key: String,
    pub settings: GenerationSettings,
    pub max_iterations: usize,
    pub cancel: CancellationToken,
}

impl AgentRequest {
    pub fn new(model: ModelDefinition, context: Context, api_key: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            model,
            context,
            tools: Vec::new(),
            api_key: api_key.into(),
            settings: GenerationSettings::default(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_tools(mut self, tools: Vec<Arc<dyn Tool>>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Handle for an in-flight run.
#[derive(Debug)]
pub struct AgentHandle {
    run_id: RunId,
    cancel: CancellationToken,
    events_rx: Option<mpsc::UnboundedReceiver<AgentEvent>>,
    outcome_rx: oneshot::Receiver<AgentOutcome>,
}

impl AgentHandle {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// The run's event stream. A second call yields an already-ended stream.
    pub fn events(&mut self) -> UnboundedReceiverStream<AgentEvent> {
        let receiver = self
            .events_rx
            .take()
            .unwrap_or_else(|| mpsc::unbounded_channel().1);
        UnboundedReceiverStream::new(receiver)
    }

    /// Request cooperative cancellation.
    ///
    /// The run observes the token at stream-read granularity and finishes
    /// with a `Canceled` outcome; no further events follow its `Done`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Await the final outcome.
    pub async fn wait(self) -> AgentOutcome {
        self.outcome_rx
            .await
            .unwrap_or_else(|_| AgentOutcome::canceled(Context::new(), Usage::default()))
    }
}

/// The agent loop. Owns nothing but the provider seam.
pub struct AgentLoop {
    provider_factory: ProviderFactory,
}

impl AgentLoop {
    /// A loop wired to real HTTP providers.
    pub fn new() -> Self {
        Self::with_provider_factory(Arc::new(|request: &AgentRequest| {
            Ok(Arc::new(HttpModelProvider::new(
                request.model.clone(),
                request.api_key.clone(),
            )) as Arc<dyn ModelProvider>)
        }))
    }

    /// A loop that builds providers through `provider_factory`.
    pub fn with_provider_factory(provider_factory: ProviderFactory) -> Self {
        Self { provider_factory }
    }

    /// Spawn a run. Events and the final outcome flow through the handle.
    pub fn start(&self, request: AgentRequest) -> AgentHandle {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let provider = (self.provider_factory)(&request);
        let handle = AgentHandle {
            run_id: request.run_id,
            cancel: request.cancel.clone(),
            events_rx: Some(events_rx),
            outcome_rx,
        };
        tokio::spawn(run_loop(request, provider, events_tx, outcome_tx));
        handle
    }
}

impl Default for AgentLoop {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_loop(
    request: AgentRequest,
    provider: Result<Arc<dyn ModelProvider>, ColloquyError>,
    events: mpsc::UnboundedSender<AgentEvent>,
    outcome_tx: oneshot::Sender<AgentOutcome>,
) {
    let AgentRequest {
        run_id,
        model,
        mut context,
        tools,
        settings,
        max_iterations,
        cancel,
        ..
    } = request;

    let provider = match provider {
        Ok(provider) => provider,
        Err(err) => {
            let _ = events.send(AgentEvent::Error {
                message: err.to_string(),
            });
            let _ = outcome_tx.send(AgentOutcome::failed(
                err.to_string(),
                context,
                Usage::default(),
            ));
            return;
        }
    };

    // The executable tool set is exactly what the model gets to see.
    context.tools = tools.iter().map(|tool| tool.definition()).collect();

    debug!(
        run_id = %run_id,
        model = %model.id,
        messages = context.messages().len(),
        tools = tools.len(),
        "agent run started"
    );

    let mut run_usage = Usage::default();
    let mut iteration = 0usize;

    loop {
        if cancel.is_cancelled() {
            let _ = events.send(AgentEvent::Done);
            let _ = outcome_tx.send(AgentOutcome::canceled(context, run_usage));
            return;
        }

        iteration += 1;
        if iteration > max_iterations {
            // Graceful stop, not a failure: the conversation so far is valid.
            let message = format!("iteration ceiling reached after {max_iterations} turns");
            let _ = events.send(AgentEvent::Error {
                message: message.clone(),
            });
            let _ = events.send(AgentEvent::Done);
            let mut outcome = AgentOutcome::completed(context, run_usage);
            outcome.error = Some(message);
            let _ = outcome_tx.send(outcome);
            return;
        }

        let mut stream = match provider
            .stream_turn(&context, &settings, cancel.clone())
            .await
        {
            Ok(stream) => stream,
            Err(err) => {
                // Request-level failure: terminal, and deliberately no done event.
                let _ = events.send(AgentEvent::Error {
                    message: err.to_string(),
                });
                let _ = outcome_tx.send(AgentOutcome::failed(err.to_string(), context, run_usage));
                return;
            }
        };

        let mut accumulator = TurnAccumulator::new();
        while let Some(event) = stream.next().await {
            match &event {
                StreamEvent::TextDelta { text } => {
                    let _ = events.send(AgentEvent::StreamDelta { text: text.clone() });
                }
                StreamEvent::ThinkingDelta { text } => {
                    let _ = events.send(AgentEvent::ThinkingDelta { text: text.clone() });
                }
                StreamEvent::Usage { usage } => {
                    let _ = events.send(AgentEvent::UsageUpdate { usage: *usage });
                }
                StreamEvent::Error { message } => {
                    // Surfaced but not terminal; keep draining this stream.
                    let _ = events.send(AgentEvent::Error {
                        message: message.clone(),
                    });
                }
                _ => {}
            }
            accumulator.apply(event);
        }

        if cancel.is_cancelled() {
            let _ = events.send(AgentEvent::Done);
            let _ = outcome_tx.send(AgentOutcome::canceled(context, run_usage));
            return;
        }

        let turn = accumulator.finish();
        run_usage.merge(&turn.usage);
        let message = turn.message;
        let calls = message.tool_calls.clone();

        debug!(
            run_id = %run_id,
            iteration,
            stop_reason = %turn.stop_reason,
            tool_calls = calls.len(),
            "turn complete"
        );

        let _ = events.send(AgentEvent::AssistantMessage {
            message: message.clone(),
        });
        context.push_message(message);

        if calls.is_empty() {
            let _ = events.send(AgentEvent::Done);
            let _ = outcome_tx.send(AgentOutcome::completed(context, run_usage));
            return;
        }

        // Sequential by contract: tools may have side effects whose order
        // the model reasoned about.
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            let _ = events.send(AgentEvent::ToolCallStarted { call: call.clone() });
            let result = dispatch_call(&tools, &call).await;
            let _ = events.send(AgentEvent::ToolCallCompleted {
                call,
                result: result.clone(),
            });
            results.push(result);
        }
        context.push_message(Message::tool_results(results));
    }
}

async fn dispatch_call(tools: &[Arc<dyn Tool>], call: &ToolCall) -> ToolResult {
    let Some(tool) = tools.iter().find(|tool| tool.name() == call.name) else {
        return ToolResult::error(
            &call.id,
            format!("{UNKNOWN_TOOL}: no tool named '{}'", call.name),
        );
    };

    let arguments = call.arguments_value();
    if let Err(errors) = validate_arguments(&arguments, &tool.parameters().schema) {
        let detail = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        return ToolResult::error(&call.id, format!("{VALIDATION_ERROR}: {detail}"));
    }

    match tool.execute(arguments).await {
        Ok(output) => ToolResult {
            tool_call_id: call.id.clone(),
            output: output.output,
            is_error: output.is_error,
            details: output.details,
        },
        Err(err) => ToolResult::error(&call.id, format!("{EXECUTION_ERROR}: {err}")),
    }
}
