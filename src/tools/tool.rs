//! Tool trait and closure-based tool wrapper.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use super::types::ToolParameters;
use crate::error::ColloquyError;
use crate::types::{ToolDefinition, ToolResultDetails};

/// What a tool execution produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    /// Text handed back to the model.
    pub output: String,
    /// Whether this is a tool-reported failure.
    pub is_error: bool,
    /// Optional structured payload for host-side rendering.
    pub details: Option<ToolResultDetails>,
}

impl ToolOutput {
    /// A successful text output.
    pub fn text(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            is_error: false,
            details: None,
        }
    }

    /// A tool-reported failure (distinct from a raised error).
    pub fn error(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            is_error: true,
            details: None,
        }
    }

    pub fn with_details(mut self, details: ToolResultDetails) -> Self {
        self.details = Some(details);
        self
    }
}

/// Core tool trait. Implement to expose a capability to the model.
///
/// `execute` receives arguments already parsed as JSON (the engine treats
/// empty or unparsable argument text as an empty object before dispatch).
/// Returning `Err` is the "tool raised" path; the loop converts it into an
/// error result rather than aborting the run.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (must match what the model calls).
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// JSON Schema parameter contract.
    fn parameters(&self) -> &ToolParameters;

    /// Execute the tool with parsed arguments.
    async fn execute(&self, args: serde_json::Value) -> Result<ToolOutput, ColloquyError>;

    /// The definition handed to protocol adapters.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters().schema.clone(),
        }
    }
}

/// Type alias for the tool handler function.
type ToolHandler = dyn Fn(serde_json::Value) -> Pin<Box<dyn Future<Output = Result<ToolOutput, ColloquyError>> + Send>>
    + Send
    + Sync;

/// Closure-based tool for quick tool creation.
pub struct FunctionTool {
    name: String,
    description: String,
    parameters: ToolParameters,
    handler: Arc<ToolHandler>,
}

impl FunctionTool {
    /// Create a tool from a closure.
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ToolParameters,
        handler: F,
    ) -> Self
    where
        F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolOutput, ColloquyError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            handler: Arc::new(move |args| Box::pin(handler(args))),
        }
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &ToolParameters {
        &self.parameters
    }

    async fn execute(&self, args: serde_json::Value) -> Result<ToolOutput, ColloquyError> {
        (self.handler)(args).await
    }
}

impl std::fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}
