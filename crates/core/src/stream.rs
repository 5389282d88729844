//! Streaming response assembler.
//!
//! Folds the server-sent-event body of a streamed chat completion into a
//! single assistant message. Fragments may split records and JSON objects
//! anywhere; an incomplete line waits for the next fragment and an
//! unparseable record is kept and retried with the following one.
//! Nothing is committed until the `[DONE]` sentinel.

use serde::Deserialize;
use tracing::trace;

use crate::message::{Message, MessageContent, MessageToolCall, Role};
use crate::provider::FinishReason;

const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Default)]
pub struct StreamAssembler {
    /// Tail of the last fragment that did not end in a newline.
    partial_line: String,
    /// Record text that has not parsed as a chunk yet.
    carryover: String,
    content: String,
    role: Option<Role>,
    tool_calls: Vec<ToolCallRecord>,
    finish_reason: Option<FinishReason>,
    done: bool,
}

#[derive(Debug)]
struct ToolCallRecord {
    index: u32,
    call: MessageToolCall,
}

impl StreamAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw fragment. Returns the assembled message exactly once,
    /// when the `[DONE]` record is seen; every later call returns `None`.
    pub fn feed(&mut self, fragment: &str) -> Option<Message> {
        if self.done {
            return None;
        }
        self.partial_line.push_str(fragment);
        while let Some(end) = self.partial_line.find('\n') {
            let line: String = self.partial_line.drain(..=end).collect();
            if let Some(message) = self.record(&line) {
                self.partial_line.clear();
                return Some(message);
            }
        }
        None
    }

    /// Flush a trailing line that never got its newline. Called once the
    /// body has ended.
    pub fn finish(&mut self) -> Option<Message> {
        if self.done {
            return None;
        }
        let line = std::mem::take(&mut self.partial_line);
        self.record(&line)
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// The last non-null `finish_reason` seen so far.
    pub fn finish_reason(&self) -> Option<&FinishReason> {
        self.finish_reason.as_ref()
    }

    /// Content accumulated so far.
    pub fn content(&self) -> &str {
        &self.content
    }

    fn record(&mut self, line: &str) -> Option<Message> {
        let line = line.trim();
        if line.is_empty() || line.starts_with(':') {
            return None;
        }
        let data = line.strip_prefix("data:").map(str::trim).unwrap_or(line);
        if data == DONE_SENTINEL {
            self.done = true;
            return Some(self.build_message());
        }

        self.carryover.push_str(data);
        match serde_json::from_str::<ChunkBody>(&self.carryover) {
            Ok(chunk) => {
                self.carryover.clear();
                self.fold(chunk);
            }
            Err(e) => {
                trace!(buffered = self.carryover.len(), error = %e, "Holding incomplete stream record");
            }
        }
        None
    }

    fn fold(&mut self, chunk: ChunkBody) {
        for choice in chunk.choices {
            self.fold_choice(choice);
        }
    }

    fn fold_choice(&mut self, choice: ChunkChoice) {
        let delta = choice.delta;

        if let Some(role) = delta.role.as_deref() {
            self.role = Some(Role::from_wire(role));
        }
        if let Some(content) = delta.content {
            self.content.push_str(&content);
        }
        for tc in delta.tool_calls.unwrap_or_default() {
            let index = tc.index.unwrap_or(0);
            let (name, arguments) = match tc.function {
                Some(f) => (f.name, f.arguments.unwrap_or_default()),
                None => (None, String::new()),
            };
            match tc.id {
                // A delta with an id opens a fresh record for its index.
                Some(id) => {
                    let call = MessageToolCall {
                        id,
                        name: name.unwrap_or_default(),
                        arguments,
                    };
                    match self.tool_calls.iter_mut().find(|r| r.index == index) {
                        Some(record) => record.call = call,
                        None => self.tool_calls.push(ToolCallRecord { index, call }),
                    }
                }
                None => match self.tool_calls.iter_mut().find(|r| r.index == index) {
                    Some(record) => {
                        if let Some(name) = name {
                            record.call.name = name;
                        }
                        record.call.arguments.push_str(&arguments);
                    }
                    None => self.tool_calls.push(ToolCallRecord {
                        index,
                        call: MessageToolCall {
                            id: String::new(),
                            name: name.unwrap_or_default(),
                            arguments,
                        },
                    }),
                },
            }
        }
        if let Some(reason) = choice.finish_reason {
            self.finish_reason = Some(FinishReason::from(reason.as_str()));
        }
    }

    fn build_message(&mut self) -> Message {
        let tool_calls: Vec<MessageToolCall> = std::mem::take(&mut self.tool_calls)
            .into_iter()
            .map(|r| r.call)
            .collect();
        let content = std::mem::take(&mut self.content);
        let content = if content.is_empty() && !tool_calls.is_empty() {
            None
        } else {
            Some(MessageContent::Text(content))
        };
        let mut message = Message::assistant_tool_calls(None, tool_calls);
        message.role = self.role.unwrap_or(Role::Assistant);
        message.content = content;
        message
    }
}

// --- Chunk wire types ---

#[derive(Debug, Deserialize)]
struct ChunkBody {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct ToolCallDelta {
    #[serde(default)]
    index: Option<u32>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<FunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct FunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}
