//! Runs a task after its prerequisites, as declared by a `TaskGraph`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use quakewatch_common::{
    Event, NewsDigest, NotificationJob, QuakeError, QuakeResult, Row, TaskIdentity,
};

use crate::deps::Deps;
use crate::graph::{Step, TaskGraph};
use crate::handlers::{
    AlertHandler, DataFetchHandler, NewsFetchHandler, RecipientQueryHandler, ReportHandler,
};

// ---------------------------------------------------------------------------
// Handler seam
// ---------------------------------------------------------------------------

/// Logic for one task identity.
#[async_trait]
pub trait Handler: Send + Sync {
    /// `inputs` holds whatever the step's prerequisites produced; `request`
    /// is the caller's free text.
    async fn run(&self, step: &Step, inputs: &Inputs, request: &str) -> QuakeResult<TaskOutput>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutput {
    Event(Event),
    News(NewsDigest),
    Rows(Vec<Row>),
    Jobs(Vec<NotificationJob>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskResult {
    pub task: TaskIdentity,
    pub output: TaskOutput,
}

/// Outputs gathered from prerequisites, by kind.
#[derive(Debug, Clone, Default)]
pub struct Inputs {
    pub event: Option<Event>,
    pub news: Option<NewsDigest>,
    pub rows: Option<Vec<Row>>,
}

impl Inputs {
    pub fn absorb(&mut self, output: TaskOutput) {
        match output {
            TaskOutput::Event(event) => self.event = Some(event),
            TaskOutput::News(news) => self.news = Some(news),
            TaskOutput::Rows(rows) => self.rows = Some(rows),
            TaskOutput::Jobs(_) => {}
        }
    }

    pub fn event(&self, task: TaskIdentity) -> QuakeResult<&Event> {
        self.event.as_ref().ok_or_else(|| missing(task, "event"))
    }

    pub fn news(&self, task: TaskIdentity) -> QuakeResult<&NewsDigest> {
        self.news.as_ref().ok_or_else(|| missing(task, "news"))
    }

    pub fn rows(&self, task: TaskIdentity) -> QuakeResult<&[Row]> {
        self.rows
            .as_deref()
            .ok_or_else(|| missing(task, "recipient rows"))
    }
}

fn missing(task: TaskIdentity, input: &str) -> QuakeError {
    QuakeError::MissingInput {
        task,
        input: input.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchPhase {
    Resolving,
    RunningPrerequisites,
    RunningTask,
    Done,
    Failed,
}

impl fmt::Display for DispatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchPhase::Resolving => write!(f, "resolving"),
            DispatchPhase::RunningPrerequisites => write!(f, "running_prerequisites"),
            DispatchPhase::RunningTask => write!(f, "running_task"),
            DispatchPhase::Done => write!(f, "done"),
            DispatchPhase::Failed => write!(f, "failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

pub struct Dispatcher {
    graph: TaskGraph,
    handlers: HashMap<TaskIdentity, Arc<dyn Handler>>,
    call_timeout: Duration,
}

impl Dispatcher {
    pub fn new(graph: TaskGraph, call_timeout: Duration) -> Self {
        Self {
            graph,
            handlers: HashMap::new(),
            call_timeout,
        }
    }

    /// Standard graph with the production handler for every task.
    pub fn standard(deps: &Deps) -> Self {
        Self::new(TaskGraph::standard(), deps.file_config.dispatch.call_timeout())
            .with_handler(TaskIdentity::DataFetch, Arc::new(DataFetchHandler::from_deps(deps)))
            .with_handler(TaskIdentity::NewsFetch, Arc::new(NewsFetchHandler::from_deps(deps)))
            .with_handler(
                TaskIdentity::RecipientQuery,
                Arc::new(RecipientQueryHandler::from_deps(deps)),
            )
            .with_handler(TaskIdentity::Alert, Arc::new(AlertHandler::from_deps(deps)))
            .with_handler(TaskIdentity::Report, Arc::new(ReportHandler::from_deps(deps)))
    }

    /// Register or replace the handler for `task`.
    pub fn with_handler(mut self, task: TaskIdentity, handler: Arc<dyn Handler>) -> Self {
        self.handlers.insert(task, handler);
        self
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    pub async fn dispatch(&self, task: TaskIdentity, request: &str) -> QuakeResult<TaskResult> {
        let run_id = Uuid::new_v4();
        debug!(%run_id, %task, phase = %DispatchPhase::Resolving, "Dispatch");
        let prerequisites = self.graph.prerequisites(task);

        let mut inputs = Inputs::default();
        if !prerequisites.is_empty() {
            debug!(
                %run_id,
                %task,
                phase = %DispatchPhase::RunningPrerequisites,
                count = prerequisites.len(),
                "Dispatch"
            );
            for step in prerequisites {
                match self.run_step(step, &inputs, request).await {
                    Ok(output) => inputs.absorb(output),
                    Err(e) => {
                        warn!(
                            %run_id,
                            %task,
                            prerequisite = %step.task,
                            phase = %DispatchPhase::Failed,
                            error = %e,
                            "Prerequisite failed"
                        );
                        return Err(QuakeError::prerequisite(step.task, e));
                    }
                }
            }
        }

        debug!(%run_id, %task, phase = %DispatchPhase::RunningTask, "Dispatch");
        let output = match self.run_step(&Step::task(task), &inputs, request).await {
            Ok(output) => output,
            Err(e) => {
                warn!(%run_id, %task, phase = %DispatchPhase::Failed, error = %e, "Task failed");
                return Err(e);
            }
        };

        info!(%run_id, %task, phase = %DispatchPhase::Done, "Dispatch complete");
        Ok(TaskResult { task, output })
    }

    /// Leaf handlers are bounded by the call timeout. Composite tasks bound
    /// each render and delivery themselves.
    async fn run_step(&self, step: &Step, inputs: &Inputs, request: &str) -> QuakeResult<TaskOutput> {
        let handler = self.handlers.get(&step.task).ok_or_else(|| {
            QuakeError::Config(format!("no handler registered for {}", step.task))
        })?;

        if self.graph.is_composite(step.task) {
            return handler.run(step, inputs, request).await;
        }

        match timeout(self.call_timeout, handler.run(step, inputs, request)).await {
            Ok(result) => result,
            Err(_) => Err(QuakeError::timeout(step.task.to_string(), self.call_timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absorb_routes_outputs_by_kind() {
        let mut inputs = Inputs::default();
        inputs.absorb(TaskOutput::Rows(vec![Row::new()]));
        inputs.absorb(TaskOutput::News(NewsDigest::default()));

        assert_eq!(inputs.rows(TaskIdentity::Alert).unwrap().len(), 1);
        assert!(inputs.news(TaskIdentity::Report).is_ok());
        assert_eq!(
            inputs.event(TaskIdentity::Alert).unwrap_err(),
            QuakeError::MissingInput {
                task: TaskIdentity::Alert,
                input: "event".into()
            }
        );
    }

    #[test]
    fn phases_render_for_logs() {
        assert_eq!(DispatchPhase::RunningPrerequisites.to_string(), "running_prerequisites");
    }
}
