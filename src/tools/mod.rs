//! Tool contracts, parameter schemas, and argument validation.

pub mod tool;
pub mod types;
pub mod validation;

pub use tool::{FunctionTool, Tool, ToolOutput};
pub use types::{ParameterBuilder, ToolParameters};
pub use validation::{validate_arguments, ValidationError};
