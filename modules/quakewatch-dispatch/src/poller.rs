//! Polling mode: watch the feed and notify on every new event.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use quakewatch_common::{QuakeError, QuakeResult, TaskIdentity};

use crate::detector::{ChangeDetector, Detection};
use crate::dispatcher::{Dispatcher, TaskOutput, TaskResult};

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// The fetch failed; the next tick retries.
    Failed(QuakeError),
    Unchanged,
    /// Both tasks ran. Either may have failed independently.
    Notified {
        alert: QuakeResult<TaskResult>,
        report: QuakeResult<TaskResult>,
    },
}

pub struct Poller {
    dispatcher: Arc<Dispatcher>,
    detector: ChangeDetector,
    interval: Duration,
}

impl Poller {
    pub fn new(dispatcher: Arc<Dispatcher>, interval: Duration) -> Self {
        Self {
            dispatcher,
            detector: ChangeDetector::new(),
            interval,
        }
    }

    /// DataFetch, then Alert followed by Report when the latest event is new.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let event = match self.dispatcher.dispatch(TaskIdentity::DataFetch, "").await {
            Ok(TaskResult {
                output: TaskOutput::Event(event),
                ..
            }) => event,
            Ok(_) => {
                return CycleOutcome::Failed(QuakeError::MissingInput {
                    task: TaskIdentity::DataFetch,
                    input: "event".into(),
                })
            }
            Err(e) => return CycleOutcome::Failed(e),
        };

        if self.detector.check(&event) == Detection::Unchanged {
            return CycleOutcome::Unchanged;
        }

        info!(
            fingerprint = %event.fingerprint(),
            magnitude = event.magnitude,
            area = %event.area,
            "New earthquake detected"
        );

        let alert = self.dispatcher.dispatch(TaskIdentity::Alert, "").await;
        let report = self.dispatcher.dispatch(TaskIdentity::Report, "").await;
        CycleOutcome::Notified { alert, report }
    }

    /// Poll until Ctrl-C.
    pub async fn run(self) {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Poll until `shutdown` resolves. The first tick fires immediately;
    /// ticks missed during a slow cycle are delayed, not burst.
    pub async fn run_until(mut self, shutdown: impl Future<Output = ()>) {
        info!(interval_secs = self.interval.as_secs(), "Poller started");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {}
            }

            let outcome = tokio::select! {
                _ = &mut shutdown => break,
                outcome = self.run_cycle() => outcome,
            };
            log_outcome(&outcome);
        }

        info!("Poller stopped");
    }
}

fn log_outcome(outcome: &CycleOutcome) {
    match outcome {
        CycleOutcome::Failed(QuakeError::NoData) => info!("Feed listed no events"),
        CycleOutcome::Failed(e) => warn!(error = %e, "Poll cycle failed"),
        CycleOutcome::Unchanged => info!("No new earthquake"),
        CycleOutcome::Notified { alert, report } => {
            for (task, result) in [(TaskIdentity::Alert, alert), (TaskIdentity::Report, report)] {
                match result {
                    Ok(_) => info!(%task, "Notification task finished"),
                    Err(e) => warn!(%task, error = %e, "Notification task failed"),
                }
            }
        }
    }
}
