//! # actloop Core
//!
//! Domain types, traits, and error definitions for the actloop
//! orchestration engine. This crate has **no runtime dependencies** beyond
//! serde and async-trait: it defines the vocabulary every other crate
//! speaks.
//!
//! ## Seams
//!
//! - [`Provider`] — a language-model endpoint that turns a transcript into a reply
//! - [`Tool`] / [`ToolRegistry`] — named capabilities invocable with a JSON argument map
//! - [`ToolExecutor`] — the uniform "execute by name, never throw" boundary the engine consumes
//! - [`ToolCallParser`] — free text in, structured calls out
//!
//! Implementations live in `actloop-providers` and `actloop-tools`; the
//! engine in `actloop-agent` only ever sees these traits.

pub mod agent;
pub mod error;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::{DependencyPolicy, RetryPolicy};
pub use error::{ProviderError, ToolError};
pub use message::{Conversation, Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse};
pub use tool::{
    Arguments, Tool, ToolCall, ToolCallParser, ToolExecutor, ToolRegistry, ToolResult,
};
