use anyhow::Context;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;

use quakewatch_common::SmtpConfig;

use super::backend::{DeliveryChannel, OutboundMessage};

/// SMTP delivery over STARTTLS.
pub struct SmtpChannel {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl SmtpChannel {
    pub fn new(config: &SmtpConfig) -> anyhow::Result<Self> {
        let sender: Mailbox = config
            .sender
            .parse()
            .with_context(|| format!("invalid SMTP sender address {:?}", config.sender))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .with_context(|| format!("invalid SMTP host {:?}", config.host))?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self { transport, sender })
    }
}

#[async_trait]
impl DeliveryChannel for SmtpChannel {
    async fn send(&self, message: &OutboundMessage) -> anyhow::Result<()> {
        let to: Mailbox = message
            .to
            .parse()
            .with_context(|| format!("invalid recipient address {:?}", message.to))?;

        let email = Message::builder()
            .from(self.sender.clone())
            .to(to)
            .subject(message.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())?;

        let response = self.transport.send(email).await?;
        debug!(to = %message.to, code = %response.code(), "SMTP accepted message");
        Ok(())
    }
}
