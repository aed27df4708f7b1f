//! Core value types for the engine.

pub mod context;
pub mod event;
pub mod generation;
pub mod message;
pub mod model;
pub mod stream;
pub mod usage;

pub use context::*;
pub use event::*;
pub use generation::*;
pub use message::*;
pub use model::*;
pub use stream::*;
pub use usage::*;
