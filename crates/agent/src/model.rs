//! The completion loop.
//!
//! A [`ModelLayer`] owns the conversation for one model endpoint. Each call
//! to [`ModelLayer::execute`] sends the whole conversation, appends the
//! assistant's reply, and keeps servicing tool calls until the model answers
//! without asking for one:
//!
//! ```text
//! Idle → Requesting → Completed
//!             ↓
//!        ToolPending → Invoking → Requesting → ...
//! ```
//!
//! Every step runs in sequence. Cancellation is honored only while waiting
//! on the provider; a tool handler that has started runs to completion.

use std::sync::Arc;

use tracing::{debug, info, warn};
use yugent_core::error::{Error, ProviderError, Result};
use yugent_core::message::{Conversation, Message};
use yugent_core::provider::{ChatRequest, Provider, ProviderResponse};
use yugent_core::stream::StreamAssembler;
use yugent_core::tool::ToolRegistry;

use crate::options::ExecuteOptions;

pub struct ModelLayer {
    provider: Arc<dyn Provider>,
    model: String,
    conversation: Conversation,
}

impl ModelLayer {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            conversation: Conversation::new(),
        }
    }

    /// Append a user message.
    pub fn human(&mut self, text: impl Into<String>) {
        self.conversation.push(Message::user(text));
    }

    /// Append a system message.
    pub fn system(&mut self, text: impl Into<String>) {
        self.conversation.push(Message::system(text));
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }

    /// Run one round to completion and return the last assistant message.
    ///
    /// On error the conversation keeps every message appended before the
    /// failure.
    pub async fn execute(&mut self, tools: &ToolRegistry, options: &ExecuteOptions) -> Result<Message> {
        let mut auto_tool_call = options.auto_tool_call;
        let mut rounds = 0usize;

        info!(
            provider = %self.provider.name(),
            model = %self.model,
            messages = self.conversation.len(),
            tools = tools.len(),
            stream = options.stream,
            "Executing completion"
        );

        loop {
            let response = self.request(tools, options).await?;
            let wants_tools = response.wants_tools();
            let reply = response.message;
            self.conversation.push(reply.clone());

            if !wants_tools {
                debug!(rounds, "Completion finished");
                return Ok(reply);
            }
            if !auto_tool_call {
                debug!(calls = reply.tool_calls.len(), "Tool calls left for the caller");
                return Ok(reply);
            }

            let pending = options.tool_call_policy.select(&reply.tool_calls);
            if pending.is_empty() {
                warn!("Model finished for tool calls but sent none");
                return Ok(reply);
            }
            if let Some(limit) = options.max_tool_rounds
                && rounds >= limit
            {
                warn!(limit, "Tool round limit reached");
                return Err(Error::ToolRoundLimit(limit));
            }
            rounds += 1;

            for call in &pending {
                let result = tools.invoke(call).await?;
                self.conversation.push(result);
            }

            if options.suspend_nested_tool_calls {
                auto_tool_call = false;
            }
        }
    }

    async fn request(&self, tools: &ToolRegistry, options: &ExecuteOptions) -> Result<ProviderResponse> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: self.conversation.messages().to_vec(),
            tools: tools.definitions(),
            stream: options.stream,
        };

        if options.stream {
            return self.request_streamed(request, options).await;
        }

        tokio::select! {
            _ = options.cancel.cancelled() => Err(ProviderError::Cancelled.into()),
            response = self.provider.complete(request) => Ok(response?),
        }
    }

    async fn request_streamed(
        &self,
        request: ChatRequest,
        options: &ExecuteOptions,
    ) -> Result<ProviderResponse> {
        let mut fragments = tokio::select! {
            _ = options.cancel.cancelled() => return Err(ProviderError::Cancelled.into()),
            stream = self.provider.stream(request) => stream?,
        };

        let mut assembler = StreamAssembler::new();
        loop {
            let next = tokio::select! {
                biased;
                _ = options.cancel.cancelled() => return Err(ProviderError::Cancelled.into()),
                next = fragments.recv() => next,
            };
            let Some(fragment) = next else {
                break;
            };
            let fragment = fragment?;
            if let Some(writer) = &options.stream_writer {
                let _ = writer.send(fragment.clone());
            }
            if let Some(message) = assembler.feed(&fragment) {
                return Ok(ProviderResponse {
                    message,
                    finish_reason: assembler.finish_reason().cloned(),
                });
            }
        }

        match assembler.finish() {
            Some(message) => Ok(ProviderResponse {
                message,
                finish_reason: assembler.finish_reason().cloned(),
            }),
            None => {
                warn!(received = assembler.content().len(), "Stream ended without [DONE]");
                Err(ProviderError::StreamIncomplete.into())
            }
        }
    }
}

impl std::fmt::Debug for ModelLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelLayer")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .field("messages", &self.conversation.len())
            .finish()
    }
}
