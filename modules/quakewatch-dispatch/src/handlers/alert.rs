use std::sync::Arc;

use async_trait::async_trait;

use quakewatch_common::{AudienceKind, QuakeResult, TaskIdentity};

use crate::compose::{AlertComposer, EventContext};
use crate::deps::Deps;
use crate::dispatcher::{Handler, Inputs, TaskOutput};
use crate::fanout::Fanout;
use crate::graph::Step;
use crate::notify::DeliveryChannel;

use super::{log_jobs, recipients_from_rows};

/// Sends a short alert about the latest event to every citizen.
pub struct AlertHandler {
    composer: AlertComposer,
    channel: Arc<dyn DeliveryChannel>,
    fanout: Fanout,
    subject: String,
}

impl AlertHandler {
    pub fn from_deps(deps: &Deps) -> Self {
        let config = &deps.file_config;
        Self {
            composer: AlertComposer::new(deps.generator.clone(), config.messages.clone()),
            channel: deps.channel.clone(),
            fanout: Fanout::from_config(&config.dispatch),
            subject: config.messages.alert_subject.clone(),
        }
    }
}

#[async_trait]
impl Handler for AlertHandler {
    async fn run(&self, _step: &Step, inputs: &Inputs, _request: &str) -> QuakeResult<TaskOutput> {
        let task = TaskIdentity::Alert;
        let context = EventContext::new(inputs.event(task)?.clone());
        let recipients = recipients_from_rows(inputs.rows(task)?, AudienceKind::Citizen);

        let jobs = self
            .fanout
            .notify(
                &context,
                recipients,
                &self.composer,
                self.channel.as_ref(),
                &self.subject,
            )
            .await;

        log_jobs(task, &jobs);
        Ok(TaskOutput::Jobs(jobs))
    }
}
