//! Local log layer: records each message as a `tracing` event.

use async_trait::async_trait;
use tracing::info;
use yugent_core::error::Result;
use yugent_core::layer::{LogLayer, LogMessage};

#[derive(Debug, Default, Clone, Copy)]
pub struct LocalLog;

#[async_trait]
impl LogLayer for LocalLog {
    fn name(&self) -> &str {
        "local"
    }

    async fn log(&self, entry: LogMessage) -> Result<()> {
        let message = entry.message;
        info!(
            id = %message.id,
            role = message.role.as_str(),
            tool_calls = message.tool_calls.len(),
            chars = message.text().len(),
            "Conversation message"
        );
        Ok(())
    }
}
