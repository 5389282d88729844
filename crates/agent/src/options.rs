//! Per-execution options.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use yugent_core::tool::ToolCallPolicy;

/// Tool rounds allowed per execution unless the caller says otherwise.
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 25;

#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Request a streamed response on every leg.
    pub stream: bool,

    /// Service tool calls the model asks for. When off, execution stops at
    /// the first assistant message, tool calls and all.
    pub auto_tool_call: bool,

    /// Service the first tool round only; follow-up legs return whatever
    /// the model says, tool calls included.
    pub suspend_nested_tool_calls: bool,

    /// Tool rounds serviced before giving up with `ToolRoundLimit`.
    /// `None` never gives up.
    pub max_tool_rounds: Option<usize>,

    pub tool_call_policy: ToolCallPolicy,

    /// Cancels in-flight requests and streams.
    pub cancel: CancellationToken,

    /// Receives every raw body fragment of a streamed response.
    pub stream_writer: Option<mpsc::UnboundedSender<String>>,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            stream: false,
            auto_tool_call: true,
            suspend_nested_tool_calls: false,
            max_tool_rounds: Some(DEFAULT_MAX_TOOL_ROUNDS),
            tool_call_policy: ToolCallPolicy::default(),
            cancel: CancellationToken::new(),
            stream_writer: None,
        }
    }
}

impl ExecuteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_auto_tool_call(mut self, enabled: bool) -> Self {
        self.auto_tool_call = enabled;
        self
    }

    pub fn with_suspend_nested_tool_calls(mut self, suspend: bool) -> Self {
        self.suspend_nested_tool_calls = suspend;
        self
    }

    pub fn with_max_tool_rounds(mut self, limit: Option<usize>) -> Self {
        self.max_tool_rounds = limit;
        self
    }

    pub fn with_tool_call_policy(mut self, policy: ToolCallPolicy) -> Self {
        self.tool_call_policy = policy;
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_stream_writer(mut self, writer: mpsc::UnboundedSender<String>) -> Self {
        self.stream_writer = Some(writer);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = ExecuteOptions::default();
        assert!(!options.stream);
        assert!(options.auto_tool_call);
        assert!(!options.suspend_nested_tool_calls);
        assert_eq!(options.max_tool_rounds, Some(25));
        assert_eq!(options.tool_call_policy, ToolCallPolicy::FirstOnly);
        assert!(!options.cancel.is_cancelled());
    }
}
