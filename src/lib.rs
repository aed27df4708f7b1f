//! Colloquy — provider-agnostic streaming agent engine.
//!
//! One uniform interface over several LLM providers, with mid-conversation
//! tool calling. The crate covers the protocol adapters that translate a
//! conversation into each provider's wire format and back, the accumulator
//! that folds a network stream into a coherent assistant turn, and the
//! bounded loop that executes requested tools and re-prompts until the model
//! stops asking.
//!
//! # Quick start
//!
//! ```no_run
//! use colloquy::prelude::*;
//!
//! # async fn example() -> colloquy::error::Result<()> {
//! let model = colloquy::catalog::find_model("gpt-4o")
//!     .ok_or_else(|| ColloquyError::InvalidArgument("unknown model".into()))?;
//! let mut context = Context::new().with_system_prompt("You are terse.");
//! context.push_message(Message::user("What's 2 + 2?"));
//!
//! let agent = AgentLoop::new();
//! let mut handle = agent.start(AgentRequest::new(model, context, "sk-..."));
//!
//! use futures::StreamExt;
//! let mut events = handle.events();
//! while let Some(event) = events.next().await {
//!     if let AgentEvent::StreamDelta { text } = event {
//!         print!("{text}");
//!     }
//! }
//! let outcome = handle.wait().await;
//! assert_eq!(outcome.status, RunStatus::Completed);
//! # Ok(())
//! # }
//! ```

pub mod agent_loop;
pub mod catalog;
pub mod error;
pub mod prelude;
pub mod provider;
pub mod tools;
pub mod types;
