//! Per-recipient render and delivery.

use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::time::timeout;
use tracing::{debug, warn};

use quakewatch_common::file_config::DispatchConfig;
use quakewatch_common::{NotificationJob, QuakeError, Recipient};

use crate::compose::{EventContext, MessageBuilder};
use crate::notify::{DeliveryChannel, OutboundMessage};

/// Renders and delivers one message per recipient. A failure for one
/// recipient is recorded in that recipient's job and never stops the rest.
#[derive(Debug, Clone, Copy)]
pub struct Fanout {
    concurrency: usize,
    call_timeout: Duration,
}

impl Fanout {
    pub fn new(concurrency: usize, call_timeout: Duration) -> Self {
        Self {
            concurrency: concurrency.max(1),
            call_timeout,
        }
    }

    pub fn from_config(config: &DispatchConfig) -> Self {
        Self::new(config.fanout_concurrency, config.call_timeout())
    }

    /// One job per recipient, in the order supplied.
    pub async fn notify(
        &self,
        context: &EventContext,
        recipients: Vec<Recipient>,
        builder: &dyn MessageBuilder,
        channel: &dyn DeliveryChannel,
        subject: &str,
    ) -> Vec<NotificationJob> {
        stream::iter(recipients)
            .map(|recipient| self.deliver_one(context, recipient, builder, channel, subject))
            .buffered(self.concurrency)
            .collect()
            .await
    }

    async fn deliver_one(
        &self,
        context: &EventContext,
        recipient: Recipient,
        builder: &dyn MessageBuilder,
        channel: &dyn DeliveryChannel,
        subject: &str,
    ) -> NotificationJob {
        let address = recipient.address.clone();
        let mut job = NotificationJob::pending(recipient);

        let body = match timeout(self.call_timeout, builder.build(&job.recipient, context)).await {
            Ok(Ok(body)) => body,
            Ok(Err(e)) => {
                warn!(to = %address, error = %e, "Render failed");
                return job.failed(e.to_string());
            }
            Err(_) => {
                let e = self.timed_out("render");
                warn!(to = %address, error = %e, "Render timed out");
                return job.failed(e.to_string());
            }
        };

        let message = OutboundMessage {
            to: address.clone(),
            subject: subject.to_string(),
            body,
        };
        let outcome = match timeout(self.call_timeout, channel.send(&message)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(QuakeError::Delivery {
                address: address.clone(),
                reason: e.to_string(),
            }),
            Err(_) => Err(self.timed_out("delivery")),
        };

        match outcome {
            Ok(()) => {
                debug!(to = %address, "Delivered");
                job.sent(message.body)
            }
            Err(e) => {
                warn!(to = %address, error = %e, "Delivery failed");
                job.rendered_content = Some(message.body);
                job.failed(e.to_string())
            }
        }
    }

    fn timed_out(&self, operation: &str) -> QuakeError {
        QuakeError::timeout(operation, self.call_timeout)
    }
}
