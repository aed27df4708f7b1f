//! Shared helpers for the integration tests: a scripted provider and a
//! small driver that runs a request to completion.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use colloquy::agent_loop::{AgentLoop, AgentOutcome, AgentRequest};
use colloquy::error::ColloquyError;
use colloquy::provider::{EventStream, ModelProvider};
use colloquy::types::{AgentEvent, Context, GenerationSettings, StopReason, StreamEvent};

/// Replays scripted turns instead of talking to a real endpoint.
///
/// Each `stream_turn` call consumes the next scripted turn. Asking for a
/// turn that was never scripted fails the request, which keeps a runaway
/// loop visible in tests instead of hanging them.
pub struct StubProvider {
    turns: Mutex<Vec<Vec<StreamEvent>>>,
}

impl StubProvider {
    pub fn new() -> Self {
        Self {
            turns: Mutex::new(Vec::new()),
        }
    }

    /// Script a turn from raw stream events.
    pub fn queue_turn(&self, events: Vec<StreamEvent>) {
        self.turns.lock().unwrap().push(events);
    }

    /// Script a turn that streams `text` in small deltas and stops.
    pub fn queue_text(&self, text: &str) {
        let chars: Vec<char> = text.chars().collect();
        let mut events: Vec<StreamEvent> = chars
            .chunks(5)
            .map(|chunk| StreamEvent::TextDelta {
                text: chunk.iter().collect(),
            })
            .collect();
        events.push(StreamEvent::Done {
            stop_reason: StopReason::Stop,
        });
        self.queue_turn(events);
    }

    /// Script a turn that requests a single tool call.
    pub fn queue_tool_call(&self, id: &str, name: &str, arguments: &str) {
        self.queue_turn(vec![
            StreamEvent::ToolCallStart {
                id: id.to_string(),
                name: name.to_string(),
            },
            StreamEvent::ToolCallDelta {
                id: id.to_string(),
                arguments: arguments.to_string(),
            },
            StreamEvent::ToolCallEnd { id: id.to_string() },
            StreamEvent::Done {
                stop_reason: StopReason::ToolUse,
            },
        ]);
    }
}

#[async_trait]
impl ModelProvider for StubProvider {
    async fn stream_turn(
        &self,
        _context: &Context,
        _settings: &GenerationSettings,
        _cancel: CancellationToken,
    ) -> Result<EventStream, ColloquyError> {
        let mut turns = self.turns.lock().unwrap();
        if turns.is_empty() {
            return Err(ColloquyError::Stream("no scripted turn left".to_string()));
        }
        Ok(futures::stream::iter(turns.remove(0)).boxed())
    }
}

/// A provider whose requests always fail before any event is produced.
pub struct FailingProvider {
    status: u16,
    message: String,
}

impl FailingProvider {
    pub fn new(status: u16, message: &str) -> Self {
        Self {
            status,
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl ModelProvider for FailingProvider {
    async fn stream_turn(
        &self,
        _context: &Context,
        _settings: &GenerationSettings,
        _cancel: CancellationToken,
    ) -> Result<EventStream, ColloquyError> {
        Err(ColloquyError::api(self.status, self.message.clone()))
    }
}

/// An agent loop that always hands out `provider`.
pub fn loop_with(provider: Arc<dyn ModelProvider>) -> AgentLoop {
    AgentLoop::with_provider_factory(Arc::new(move |_: &AgentRequest| Ok(provider.clone())))
}

/// Drive a request to completion, collecting every event and the outcome.
pub async fn run_to_end(
    agent: &AgentLoop,
    request: AgentRequest,
) -> (Vec<AgentEvent>, AgentOutcome) {
    let mut handle = agent.start(request);
    let events = timeout(Duration::from_secs(5), handle.events().collect::<Vec<_>>())
        .await
        .expect("event stream did not finish");
    let outcome = timeout(Duration::from_secs(5), handle.wait())
        .await
        .expect("outcome did not arrive");
    (events, outcome)
}
