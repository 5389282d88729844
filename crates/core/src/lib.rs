//! # yugent core
//!
//! Domain types, traits, and error definitions for the yugent agent runtime.
//! Besides the message model this crate holds the three pieces every other
//! crate builds on:
//!
//! - [`schema`]: derives tool parameter schemas from structural type
//!   declarations
//! - [`tool`]: the tool registry and invoker
//! - [`stream`]: folds a streamed chat completion into one message
//!
//! Providers, tools and loggers are traits here; implementations live in
//! their own crates.

pub mod error;
pub mod layer;
pub mod message;
pub mod provider;
pub mod schema;
pub mod stream;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, SchemaError, ToolError};
pub use layer::{LogLayer, LogMessage};
pub use message::{Conversation, Message, MessageContent, MessageToolCall, Role};
pub use provider::{ChatRequest, FinishReason, FragmentStream, Provider, ProviderResponse};
pub use schema::{PropertyMap, PropertySchema, SchemaKind, derive_properties};
pub use stream::StreamAssembler;
pub use tool::{PendingToolCall, Tool, ToolCallPolicy, ToolDefinition, ToolLayer, ToolRegistry};
