//! Notification sink abstraction.

use fallwatch_common::error::FallwatchResult;

/// Destination for alert messages and evidence photos.
#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Deliver a plain text alert.
    async fn send_message(&self, text: &str) -> FallwatchResult<()>;

    /// Deliver a JPEG image with a caption.
    async fn send_photo(&self, jpeg: &[u8], caption: &str) -> FallwatchResult<()>;
}

/// Writes alerts to the log instead of delivering them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait::async_trait]
impl NotificationSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn send_message(&self, text: &str) -> FallwatchResult<()> {
        tracing::warn!(sink = "log", "{}", text);
        Ok(())
    }

    async fn send_photo(&self, jpeg: &[u8], caption: &str) -> FallwatchResult<()> {
        tracing::info!(sink = "log", bytes = jpeg.len(), caption, "Evidence photo");
        Ok(())
    }
}
