//! Shared test helpers: a scripted provider and a counting tool.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use yugent_core::error::{ProviderError, ToolError};
use yugent_core::message::{Message, MessageToolCall};
use yugent_core::provider::{ChatRequest, FinishReason, FragmentStream, Provider, ProviderResponse};
use yugent_core::tool::Tool;

/// One scripted provider reply.
pub enum Script {
    Reply(ProviderResponse),
    Fail(ProviderError),
    /// Raw body fragments for a streamed request.
    Stream(Vec<String>),
    /// Never answers.
    Hang,
}

impl Script {
    pub fn text(text: &str) -> Self {
        Script::Reply(ProviderResponse {
            message: Message::assistant(text),
            finish_reason: Some(FinishReason::Stop),
        })
    }

    pub fn tool_calls(calls: Vec<MessageToolCall>) -> Self {
        Script::Reply(ProviderResponse {
            message: Message::assistant_tool_calls(None, calls),
            finish_reason: Some(FinishReason::ToolCalls),
        })
    }
}

/// Returns scripted replies in order and records every request.
///
/// Panics if called more times than it has replies.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<ChatRequest>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Script>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn request(&self, n: usize) -> ChatRequest {
        self.requests.lock().unwrap()[n].clone()
    }

    fn next(&self, request: ChatRequest) -> Script {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("ScriptedProvider exhausted at call #{n}"))
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ChatRequest) -> Result<ProviderResponse, ProviderError> {
        match self.next(request) {
            Script::Reply(response) => Ok(response),
            Script::Fail(e) => Err(e),
            Script::Hang => std::future::pending().await,
            Script::Stream(_) => panic!("streamed script used for a complete() call"),
        }
    }

    async fn stream(&self, request: ChatRequest) -> Result<FragmentStream, ProviderError> {
        match self.next(request) {
            Script::Stream(fragments) => {
                let (tx, rx) = tokio::sync::mpsc::channel(fragments.len().max(1));
                for fragment in fragments {
                    tx.send(Ok(fragment)).await.unwrap();
                }
                Ok(rx)
            }
            Script::Fail(e) => Err(e),
            Script::Hang => std::future::pending().await,
            Script::Reply(_) => panic!("complete script used for a stream() call"),
        }
    }
}

/// Echoes its arguments back and counts calls.
pub struct EchoTool {
    name: &'static str,
    calls: AtomicUsize,
}

impl EchoTool {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "Echoes its arguments"
    }

    async fn call(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(arguments)
    }
}

pub fn tool_call(id: &str, name: &str, arguments: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments: arguments.to_string(),
    }
}
