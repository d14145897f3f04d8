use async_trait::async_trait;

/// One message addressed to one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Pluggable delivery transport.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> anyhow::Result<()>;
}
