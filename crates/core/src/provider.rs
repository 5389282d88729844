//! Provider trait: the abstraction over chat-completion endpoints.
//!
//! A Provider knows how to send a message sequence to a model and get a
//! response back, either as one parsed message or as a stream of raw body
//! fragments that the [`StreamAssembler`](crate::stream::StreamAssembler)
//! folds into a message.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::ProviderError;
use crate::message::Message;
use crate::tool::ToolDefinition;

/// One chat-completion request.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// The model to use (e.g. "gpt-4o")
    pub model: String,

    /// The full message sequence
    pub messages: Vec<Message>,

    /// Tools the model may call; omitted from the wire when empty
    pub tools: Vec<ToolDefinition>,

    /// Whether to ask for a streamed response
    pub stream: bool,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
    ContentFilter,
    Other(String),
}

impl FinishReason {
    pub fn is_tool_calls(&self) -> bool {
        matches!(self, FinishReason::ToolCalls)
    }
}

impl From<&str> for FinishReason {
    fn from(s: &str) -> Self {
        match s {
            "stop" => FinishReason::Stop,
            "tool_calls" => FinishReason::ToolCalls,
            "length" => FinishReason::Length,
            "content_filter" => FinishReason::ContentFilter,
            other => FinishReason::Other(other.to_string()),
        }
    }
}

/// A complete (non-streaming) response.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    /// The generated assistant message
    pub message: Message,

    /// `choices[0].finish_reason`, if the provider sent one
    pub finish_reason: Option<FinishReason>,
}

impl ProviderResponse {
    pub fn wants_tools(&self) -> bool {
        self.finish_reason
            .as_ref()
            .is_some_and(FinishReason::is_tool_calls)
    }
}

/// Raw decoded response-body fragments, in arrival order.
pub type FragmentStream = mpsc::Receiver<Result<String, ProviderError>>;

/// The core Provider trait.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g. "openai", "groq").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: ChatRequest) -> Result<ProviderResponse, ProviderError>;

    /// Send a request and get the response body as it arrives.
    ///
    /// The channel closes when the body ends. A transport failure mid-body is
    /// delivered as an `Err` item.
    async fn stream(&self, _request: ChatRequest) -> Result<FragmentStream, ProviderError> {
        Err(ProviderError::NotConfigured(format!(
            "Provider '{}' does not support streaming",
            self.name()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_reason_parsing() {
        assert_eq!(FinishReason::from("tool_calls"), FinishReason::ToolCalls);
        assert_eq!(FinishReason::from("stop"), FinishReason::Stop);
        assert_eq!(
            FinishReason::from("eos"),
            FinishReason::Other("eos".into())
        );
    }

    #[test]
    fn only_tool_calls_finish_wants_tools() {
        let response = ProviderResponse {
            message: Message::assistant("done"),
            finish_reason: Some(FinishReason::Stop),
        };
        assert!(!response.wants_tools());

        let response = ProviderResponse {
            message: Message::assistant_tool_calls(None, vec![]),
            finish_reason: Some(FinishReason::ToolCalls),
        };
        assert!(response.wants_tools());

        let response = ProviderResponse {
            message: Message::assistant("no reason"),
            finish_reason: None,
        };
        assert!(!response.wants_tools());
    }
}
