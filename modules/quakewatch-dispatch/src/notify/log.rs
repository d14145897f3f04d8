use async_trait::async_trait;
use tracing::info;

use super::backend::{DeliveryChannel, OutboundMessage};

/// Writes messages to the log instead of sending them. Used when no SMTP
/// transport is configured.
pub struct LogChannel;

#[async_trait]
impl DeliveryChannel for LogChannel {
    async fn send(&self, message: &OutboundMessage) -> anyhow::Result<()> {
        info!(
            to = %message.to,
            subject = %message.subject,
            body = %message.body,
            "Delivery (log only)"
        );
        Ok(())
    }
}
