//! Log layer trait.
//!
//! Log layers observe the conversation: before each execution the composer
//! hands every log layer the most recent message. Delivery is
//! fire-and-forget and a failing logger never affects the completion.

use async_trait::async_trait;

use crate::error::Result;
use crate::message::Message;

/// What a log layer receives.
#[derive(Debug, Clone)]
pub struct LogMessage {
    pub message: Message,
}

#[async_trait]
pub trait LogLayer: Send + Sync {
    /// A short name used in diagnostics.
    fn name(&self) -> &str {
        "log"
    }

    async fn log(&self, entry: LogMessage) -> Result<()>;
}
