//! The bounded tool-calling agent loop.

pub mod accumulator;
pub mod runner;
pub mod types;

pub use accumulator::{CompletedTurn, TurnAccumulator};
pub use runner::{
    AgentHandle, AgentLoop, AgentRequest, ProviderFactory, DEFAULT_MAX_ITERATIONS,
    EXECUTION_ERROR, UNKNOWN_TOOL, VALIDATION_ERROR,
};
pub use types::{AgentOutcome, RunId, RunStatus};
