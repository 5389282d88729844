//! Layer composer.
//!
//! [`Llm`] is the composition root: an ordered list of layers, exactly one
//! of which must be a model layer. Each [`Llm::execute`] checks that, hands
//! the latest message to every log layer without waiting, collects the tool
//! layers into a registry, and runs the model layer's completion loop.

use std::sync::Arc;

use tracing::debug;
use yugent_core::error::{Error, Result};
use yugent_core::layer::{LogLayer, LogMessage};
use yugent_core::message::Message;
use yugent_core::tool::{ToolLayer, ToolRegistry};

use crate::model::ModelLayer;
use crate::options::ExecuteOptions;

pub enum Layer {
    Model(ModelLayer),
    Log(Arc<dyn LogLayer>),
    Tool(ToolLayer),
}

impl Layer {
    pub fn log(layer: impl LogLayer + 'static) -> Self {
        Layer::Log(Arc::new(layer))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Layer::Model(_) => "model",
            Layer::Log(_) => "log",
            Layer::Tool(_) => "tool",
        }
    }
}

impl From<ModelLayer> for Layer {
    fn from(model: ModelLayer) -> Self {
        Layer::Model(model)
    }
}

impl From<ToolLayer> for Layer {
    fn from(tool: ToolLayer) -> Self {
        Layer::Tool(tool)
    }
}

#[derive(Default)]
pub struct Llm {
    layers: Vec<Layer>,
}

impl Llm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layers(layers: impl IntoIterator<Item = Layer>) -> Self {
        Self {
            layers: layers.into_iter().collect(),
        }
    }

    pub fn add(&mut self, layer: impl Into<Layer>) -> &mut Self {
        self.layers.push(layer.into());
        self
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// The single model layer.
    pub fn model(&self) -> Result<&ModelLayer> {
        let mut models = self.layers.iter().filter_map(|l| match l {
            Layer::Model(m) => Some(m),
            _ => None,
        });
        let first = models.next().ok_or(Error::MissingModelLayer)?;
        match models.count() {
            0 => Ok(first),
            extra => Err(Error::DuplicateModelLayer(extra + 1)),
        }
    }

    pub fn model_mut(&mut self) -> Result<&mut ModelLayer> {
        self.model()?;
        self.layers
            .iter_mut()
            .find_map(|l| match l {
                Layer::Model(m) => Some(m),
                _ => None,
            })
            .ok_or(Error::MissingModelLayer)
    }

    /// Append a user message to the model layer's conversation.
    pub fn human(&mut self, text: impl Into<String>) -> Result<()> {
        self.model_mut()?.human(text);
        Ok(())
    }

    /// Run one round: validate the layers, notify loggers, run the loop.
    pub async fn execute(&mut self, options: &ExecuteOptions) -> Result<Message> {
        let latest = self.model()?.conversation().last().cloned();
        if let Some(message) = latest {
            self.fan_out(message);
        }

        let tools: ToolRegistry = self
            .layers
            .iter()
            .filter_map(|l| match l {
                Layer::Tool(t) => Some(t.clone()),
                _ => None,
            })
            .collect();

        self.model_mut()?.execute(&tools, options).await
    }

    fn fan_out(&self, message: Message) {
        for layer in &self.layers {
            let Layer::Log(logger) = layer else {
                continue;
            };
            let logger = Arc::clone(logger);
            let entry = LogMessage {
                message: message.clone(),
            };
            tokio::spawn(async move {
                if let Err(e) = logger.log(entry).await {
                    debug!(logger = %logger.name(), error = %e, "Log layer failed");
                }
            });
        }
    }
}

impl std::fmt::Debug for Llm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kinds: Vec<&str> = self.layers.iter().map(Layer::kind).collect();
        f.debug_struct("Llm").field("layers", &kinds).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    struct ChannelLog(mpsc::UnboundedSender<Message>);

    #[async_trait]
    impl LogLayer for ChannelLog {
        async fn log(&self, entry: LogMessage) -> Result<()> {
            let _ = self.0.send(entry.message);
            Ok(())
        }
    }

    struct FailingLog(Arc<AtomicUsize>);

    #[async_trait]
    impl LogLayer for FailingLog {
        fn name(&self) -> &str {
            "failing"
        }

        async fn log(&self, _entry: LogMessage) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(Error::Internal("disk full".into()))
        }
    }

    fn model(provider: &Arc<ScriptedProvider>) -> ModelLayer {
        ModelLayer::new(provider.clone(), "mock-model")
    }

    #[tokio::test]
    async fn missing_model_layer_fails_before_any_request() {
        let mut llm = Llm::new();
        llm.add(ToolLayer::from_tool(Arc::new(EchoTool::new("echo"))));

        let err = llm.execute(&ExecuteOptions::default()).await.unwrap_err();
        assert!(matches!(err, Error::MissingModelLayer));
        assert!(matches!(llm.human("hi"), Err(Error::MissingModelLayer)));
    }

    #[tokio::test]
    async fn duplicate_model_layers_fail_before_any_request() {
        let provider = Arc::new(ScriptedProvider::new(vec![Script::text("never")]));
        let mut llm = Llm::with_layers([
            Layer::Model(model(&provider)),
            Layer::Model(model(&provider)),
        ]);

        let err = llm.execute(&ExecuteOptions::default()).await.unwrap_err();
        assert!(matches!(err, Error::DuplicateModelLayer(2)));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn tool_layers_reach_the_model() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Script::tool_calls(vec![tool_call("call_1", "echo", json!({"x": 1}))]),
            Script::text("done"),
        ]));
        let echo = Arc::new(EchoTool::new("echo"));
        let mut llm = Llm::new();
        llm.add(model(&provider))
            .add(ToolLayer::new("echo_layer", echo.clone()));
        llm.human("go").unwrap();

        let reply = llm.execute(&ExecuteOptions::default()).await.unwrap();
        assert_eq!(reply.text(), "done");
        assert_eq!(echo.calls(), 1);
        let definitions = provider.request(0).tools;
        assert_eq!(definitions.len(), 1);
        assert_eq!(definitions[0].name(), "echo");
    }

    #[tokio::test]
    async fn loggers_receive_the_latest_message() {
        let provider = Arc::new(ScriptedProvider::new(vec![Script::text("hi back")]));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut llm = Llm::new();
        llm.add(Layer::log(ChannelLog(tx))).add(model(&provider));
        llm.human("hello").unwrap();

        llm.execute(&ExecuteOptions::default()).await.unwrap();

        let logged = rx.recv().await.unwrap();
        assert_eq!(logged.text(), "hello");
    }

    #[tokio::test]
    async fn failing_logger_does_not_fail_the_round() {
        let provider = Arc::new(ScriptedProvider::new(vec![Script::text("fine")]));
        let attempts = Arc::new(AtomicUsize::new(0));
        let mut llm = Llm::new();
        llm.add(model(&provider))
            .add(Layer::log(FailingLog(attempts.clone())));
        llm.human("hello").unwrap();

        let reply = llm.execute(&ExecuteOptions::default()).await.unwrap();
        assert_eq!(reply.text(), "fine");

        for _ in 0..10 {
            if attempts.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_conversation_skips_fan_out() {
        let provider = Arc::new(ScriptedProvider::new(vec![Script::text("hello?")]));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut llm = Llm::new();
        llm.add(model(&provider)).add(Layer::log(ChannelLog(tx)));

        llm.execute(&ExecuteOptions::default()).await.unwrap();
        drop(llm);
        assert!(rx.recv().await.is_none());
    }
}
