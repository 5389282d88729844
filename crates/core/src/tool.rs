//! Tool trait, registry and invoker.
//!
//! Tools are what give the model the ability to act: read a file, look up
//! the weather, and so on. A tool is registered under a key (its layer id);
//! when the model asks for a tool, the registry resolves the request by
//! that key or by the tool's own name, parses the argument text, runs the
//! handler, and turns the result into a tool message.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ToolError;
use crate::message::{Message, MessageToolCall};
use crate::schema::{PropertyMap, PropertySchema};

/// The core Tool trait.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The name the model uses to call this tool (e.g. "read_file").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// The tool's parameters. `None` exports an empty object schema.
    fn parameters(&self) -> Option<&PropertyMap> {
        None
    }

    /// Run the tool with already-parsed arguments.
    async fn call(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError>;

    /// Convert this tool into a definition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition::function(
            self.name(),
            self.description(),
            self.parameters().cloned().unwrap_or_default(),
        )
    }
}

/// A tool definition in the chat-completion wire shape:
/// `{"type": "function", "function": {name, description, parameters}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    /// Always an object schema.
    pub parameters: PropertySchema,
}

impl ToolDefinition {
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        properties: PropertyMap,
    ) -> Self {
        Self {
            kind: "function",
            function: FunctionDefinition {
                name: name.into(),
                description: description.into(),
                parameters: PropertySchema::object(properties),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }
}

/// A registered tool: the registry key plus the handler.
#[derive(Clone)]
pub struct ToolLayer {
    pub id: String,
    pub tool: Arc<dyn Tool>,
}

impl ToolLayer {
    pub fn new(id: impl Into<String>, tool: Arc<dyn Tool>) -> Self {
        Self {
            id: id.into(),
            tool,
        }
    }

    /// Register a tool under its own name.
    pub fn from_tool(tool: Arc<dyn Tool>) -> Self {
        Self {
            id: tool.name().to_string(),
            tool,
        }
    }
}

impl std::fmt::Debug for ToolLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolLayer")
            .field("id", &self.id)
            .field("tool", &self.tool.name())
            .finish()
    }
}

/// A tool call the model asked for, waiting to be serviced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingToolCall {
    /// Registry key or tool name.
    pub tool_id: String,
    /// Echoed back as the tool message's `tool_call_id`.
    pub call_id: String,
    /// Argument text exactly as the model produced it.
    pub raw_arguments: String,
}

impl From<&MessageToolCall> for PendingToolCall {
    fn from(call: &MessageToolCall) -> Self {
        Self {
            tool_id: call.name.clone(),
            call_id: call.id.clone(),
            raw_arguments: call.arguments.clone(),
        }
    }
}

/// Which of the tool calls in one assistant message get serviced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolCallPolicy {
    /// Service only the first call; the rest are dropped with a warning.
    #[default]
    #[serde(rename = "first")]
    FirstOnly,
    /// Service every call, sequentially, in order.
    #[serde(rename = "all")]
    All,
}

impl ToolCallPolicy {
    pub fn select(&self, calls: &[MessageToolCall]) -> Vec<PendingToolCall> {
        match self {
            ToolCallPolicy::All => calls.iter().map(PendingToolCall::from).collect(),
            ToolCallPolicy::FirstOnly => {
                if calls.len() > 1 {
                    let dropped: Vec<&str> = calls[1..].iter().map(|c| c.id.as_str()).collect();
                    warn!(
                        serviced = %calls[0].id,
                        dropped = ?dropped,
                        "Model requested several tool calls; servicing only the first"
                    );
                }
                calls.first().map(PendingToolCall::from).into_iter().collect()
            }
        }
    }
}

/// An ordered collection of tool layers. Duplicate keys are allowed;
/// resolution picks the first match in registration order.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    layers: Vec<ToolLayer>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, layer: ToolLayer) {
        self.layers.push(layer);
    }

    /// First layer whose key or tool name equals `id`.
    pub fn resolve(&self, id: &str) -> Option<&ToolLayer> {
        self.layers
            .iter()
            .find(|layer| layer.id == id || layer.tool.name() == id)
    }

    /// Every registered tool's definition, in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.layers.iter().map(|l| l.tool.to_definition()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.tool.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Resolve, parse arguments, run the handler, and wrap the result as a
    /// tool message. Any failure is fatal for the round.
    pub async fn invoke(&self, call: &PendingToolCall) -> Result<Message, ToolError> {
        let layer = self
            .resolve(&call.tool_id)
            .ok_or_else(|| ToolError::NotFound(call.tool_id.clone()))?;

        let arguments = parse_arguments(&call.raw_arguments).map_err(|e| {
            ToolError::InvalidArguments {
                tool_name: call.tool_id.clone(),
                reason: e.to_string(),
            }
        })?;

        debug!(tool = %call.tool_id, call_id = %call.call_id, "Invoking tool");
        let output = layer.tool.call(arguments).await?;

        let content = match output {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        Ok(Message::tool_result(call.call_id.clone(), content))
    }
}

impl FromIterator<ToolLayer> for ToolRegistry {
    fn from_iter<I: IntoIterator<Item = ToolLayer>>(iter: I) -> Self {
        Self {
            layers: iter.into_iter().collect(),
        }
    }
}

fn parse_arguments(raw: &str) -> Result<serde_json::Value, serde_json::Error> {
    if raw.trim().is_empty() {
        return Ok(serde_json::Value::Object(serde_json::Map::new()));
    }
    serde_json::from_str(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoTool {
        name: &'static str,
        calls: AtomicUsize,
        properties: PropertyMap,
    }

    impl EchoTool {
        fn named(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                calls: AtomicUsize::new(0),
                properties: PropertyMap::new().with("text", PropertySchema::string()),
            })
        }
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn parameters(&self) -> Option<&PropertyMap> {
            Some(&self.properties)
        }
        async fn call(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!({ "echo": arguments["text"], "by": self.name }))
        }
    }

    struct PlainTool;

    #[async_trait]
    impl Tool for PlainTool {
        fn name(&self) -> &str {
            "plain"
        }
        fn description(&self) -> &str {
            "Returns a bare string"
        }
        async fn call(&self, _arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
            Ok(json!("just text"))
        }
    }

    fn pending(tool_id: &str, args: &str) -> PendingToolCall {
        PendingToolCall {
            tool_id: tool_id.into(),
            call_id: "call_1".into(),
            raw_arguments: args.into(),
        }
    }

    #[test]
    fn resolves_by_key_or_name() {
        let mut registry = ToolRegistry::new();
        registry.register(ToolLayer::new("echo-key", EchoTool::named("echo")));
        assert!(registry.resolve("echo-key").is_some());
        assert!(registry.resolve("echo").is_some());
        assert!(registry.resolve("nonexistent").is_none());
    }

    #[tokio::test]
    async fn first_registered_match_wins() {
        let first = EchoTool::named("echo");
        let second = EchoTool::named("echo");
        let mut registry = ToolRegistry::new();
        registry.register(ToolLayer::new("a", first.clone()));
        registry.register(ToolLayer::new("b", second.clone()));

        registry.invoke(&pending("echo", "{}")).await.unwrap();
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invoke_wraps_result_as_tool_message() {
        let mut registry = ToolRegistry::new();
        registry.register(ToolLayer::from_tool(EchoTool::named("echo")));
        registry.register(ToolLayer::from_tool(Arc::new(PlainTool)));

        let msg = registry
            .invoke(&pending("echo", r#"{"text":"hi"}"#))
            .await
            .unwrap();
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
        let body: serde_json::Value = serde_json::from_str(&msg.text()).unwrap();
        assert_eq!(body, json!({ "echo": "hi", "by": "echo" }));

        let msg = registry.invoke(&pending("plain", "")).await.unwrap();
        assert_eq!(msg.text(), "just text");
    }

    #[tokio::test]
    async fn missing_tool_is_not_found() {
        let registry = ToolRegistry::new();
        let err = registry.invoke(&pending("nope", "{}")).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(id) if id == "nope"));
    }

    #[tokio::test]
    async fn malformed_arguments_skip_the_handler() {
        let tool = EchoTool::named("echo");
        let mut registry = ToolRegistry::new();
        registry.register(ToolLayer::from_tool(tool.clone()));

        let err = registry
            .invoke(&pending("echo", r#"{"text": "#))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
        assert_eq!(tool.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_arguments_invoke_with_empty_object() {
        let tool = EchoTool::named("echo");
        let mut registry = ToolRegistry::new();
        registry.register(ToolLayer::from_tool(tool.clone()));

        let msg = registry.invoke(&pending("echo", "  ")).await.unwrap();
        let body: serde_json::Value = serde_json::from_str(&msg.text()).unwrap();
        assert_eq!(body, json!({ "echo": null, "by": "echo" }));
        assert_eq!(tool.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn definitions_follow_wire_shape() {
        let mut registry = ToolRegistry::new();
        registry.register(ToolLayer::from_tool(EchoTool::named("echo")));
        registry.register(ToolLayer::from_tool(Arc::new(PlainTool)));

        let defs = serde_json::to_value(registry.definitions()).unwrap();
        assert_eq!(
            defs[0],
            json!({
                "type": "function",
                "function": {
                    "name": "echo",
                    "description": "Echoes back the input",
                    "parameters": {
                        "type": "object",
                        "properties": { "text": { "type": "string" } },
                        "required": ["text"]
                    }
                }
            })
        );
        assert_eq!(
            defs[1]["function"]["parameters"],
            json!({ "type": "object", "properties": {} })
        );
    }

    #[test]
    fn first_only_policy_drops_the_rest() {
        let calls = vec![
            MessageToolCall {
                id: "a".into(),
                name: "echo".into(),
                arguments: "{}".into(),
            },
            MessageToolCall {
                id: "b".into(),
                name: "plain".into(),
                arguments: "{}".into(),
            },
        ];
        let first = ToolCallPolicy::FirstOnly.select(&calls);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].call_id, "a");

        let all = ToolCallPolicy::All.select(&calls);
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].tool_id, "plain");

        assert!(ToolCallPolicy::default().select(&[]).is_empty());
    }
}
