//! Production handler for each task identity.

mod alert;
mod data;
mod news;
mod recipients;
mod report;

pub use alert::AlertHandler;
pub use data::DataFetchHandler;
pub use news::NewsFetchHandler;
pub use recipients::{recipients_from_rows, RecipientQueryHandler};
pub use report::ReportHandler;

use quakewatch_common::{NotificationJob, TaskIdentity};
use tracing::info;

fn log_jobs(task: TaskIdentity, jobs: &[NotificationJob]) {
    let sent = jobs.iter().filter(|j| j.status.is_sent()).count();
    info!(
        %task,
        recipients = jobs.len(),
        sent,
        failed = jobs.len() - sent,
        "Fanout complete"
    );
}
