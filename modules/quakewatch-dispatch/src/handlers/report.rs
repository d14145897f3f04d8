use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use quakewatch_common::file_config::ReferenceConfig;
use quakewatch_common::{AudienceKind, QuakeResult, TaskIdentity};

use crate::compose::{EventContext, ReportComposer};
use crate::deps::Deps;
use crate::dispatcher::{Handler, Inputs, TaskOutput};
use crate::fanout::Fanout;
use crate::graph::Step;
use crate::notify::DeliveryChannel;
use crate::reference::ReferenceLibrary;

use super::{log_jobs, recipients_from_rows};

/// Sends a grounded situation report to every response organization.
pub struct ReportHandler {
    composer: ReportComposer,
    channel: Arc<dyn DeliveryChannel>,
    fanout: Fanout,
    subject: String,
    reference: Arc<ReferenceLibrary>,
    reference_config: ReferenceConfig,
}

impl ReportHandler {
    pub fn from_deps(deps: &Deps) -> Self {
        let config = &deps.file_config;
        Self {
            composer: ReportComposer::new(deps.generator.clone(), config.messages.clone()),
            channel: deps.channel.clone(),
            fanout: Fanout::from_config(&config.dispatch),
            subject: config.messages.report_subject.clone(),
            reference: deps.reference.clone(),
            reference_config: config.reference.clone(),
        }
    }
}

#[async_trait]
impl Handler for ReportHandler {
    async fn run(&self, _step: &Step, inputs: &Inputs, _request: &str) -> QuakeResult<TaskOutput> {
        let task = TaskIdentity::Report;
        let excerpt = self
            .reference
            .excerpt(&self.reference_config.query, self.reference_config.max_chars);
        if excerpt.is_none() {
            warn!("No reference excerpt available, report will not be grounded in a guide");
        }

        let context = EventContext::new(inputs.event(task)?.clone())
            .with_news(inputs.news(task)?.clone())
            .with_reference(excerpt);
        let recipients = recipients_from_rows(inputs.rows(task)?, AudienceKind::Organization);

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
