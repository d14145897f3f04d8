//! Routes free text to a task identity, or answers conversationally.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, info, warn};

use quakewatch_common::{DeliveryStatus, QuakeError, TaskIdentity};

use crate::compose::describe_event;
use crate::dispatcher::{Dispatcher, TaskOutput, TaskResult};
use crate::generator::TextGenerator;

static RE_GREETING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(hi|hello|hey|halo|hai|selamat\s+(pagi|siang|sore|malam)|terima\s+kasih|thanks|thank\s+you)[\s!.,]*$",
    )
    .expect("valid regex")
});

static RE_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(DataFetch|NewsFetch|RecipientQuery|Alert|Report)\b").expect("valid regex")
});

const ROUTER_SYSTEM: &str = "\
Route the request to exactly one of these tasks and answer with its label only:
- DataFetch: fetch and store the latest earthquake from the official feed.
- NewsFetch: search recent earthquake news.
- RecipientQuery: look up people or organizations in the database.
- Alert: send a short earthquake alert to every citizen. Runs DataFetch and RecipientQuery first.
- Report: send a situation report to every response organization. Runs DataFetch, NewsFetch and RecipientQuery first.
If the request is small talk or fits none of these, answer NONE.";

pub const CONVERSATIONAL_REPLY: &str = "Halo! Saya dapat membantu informasi gempa bumi: data gempa \
terbaru, berita gempa, pencarian data penerima, serta pengiriman peringatan dan laporan gempa. \
Ada yang bisa saya bantu?";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Task(TaskIdentity),
    Conversational,
}

/// Outcome of handling one line of user input.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Conversational(String),
    Completed(TaskResult),
    Failed { task: TaskIdentity, error: QuakeError },
}

pub struct Coordinator {
    generator: Arc<dyn TextGenerator>,
    dispatcher: Arc<Dispatcher>,
}

impl Coordinator {
    pub fn new(generator: Arc<dyn TextGenerator>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            generator,
            dispatcher,
        }
    }

    pub async fn route(&self, text: &str) -> Route {
        let text = text.trim();
        if text.is_empty() || RE_GREETING.is_match(text) {
            return Route::Conversational;
        }

        match self.generator.generate(ROUTER_SYSTEM, text).await {
            Ok(answer) => {
                let route = parse_route(&answer);
                debug!(%answer, ?route, "Routed request");
                route
            }
            Err(e) => {
                warn!(error = %e, "Routing failed, answering conversationally");
                Route::Conversational
            }
        }
    }

    pub async fn handle(&self, text: &str) -> Reply {
        match self.route(text).await {
            Route::Conversational => Reply::Conversational(CONVERSATIONAL_REPLY.to_string()),
            Route::Task(task) => {
                info!(%task, "Dispatching routed request");
                match self.dispatcher.dispatch(task, text).await {
                    Ok(result) => Reply::Completed(result),
                    Err(error) => Reply::Failed { task, error },
                }
            }
        }
    }
}

/// Exactly one distinct label routes to a task; none or several do not.
pub fn parse_route(answer: &str) -> Route {
    let labels: BTreeSet<String> = RE_LABEL
        .captures_iter(answer)
        .map(|c| c[1].to_lowercase())
        .collect();
    if labels.len() != 1 {
        return Route::Conversational;
    }
    TaskIdentity::ALL
        .into_iter()
        .find(|task| labels.contains(&task.label().to_lowercase()))
        .map(Route::Task)
        .unwrap_or(Route::Conversational)
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Conversational(text) => f.write_str(text),
            Reply::Failed { task, error } => write!(f, "{task} failed: {error}"),
            Reply::Completed(result) => match &result.output {
                TaskOutput::Event(event) => {
                    write!(f, "Latest earthquake:\n{}", describe_event(event))
                }
                TaskOutput::News(news) => {
                    if let Some(answer) = &news.answer {
                        writeln!(f, "{answer}")?;
                    }
                    if news.articles.is_empty() {
                        return write!(f, "No news found for \"{}\".", news.query);
                    }
                    for article in &news.articles {
                        writeln!(f, "- {} ({})", article.title, article.url)?;
                    }
                    Ok(())
                }
                TaskOutput::Rows(rows) => {
                    if rows.is_empty() {
                        return f.write_str("No rows.");
                    }
                    for row in rows {
                        writeln!(f, "{}", serde_json::Value::Object(row.clone()))?;
                    }
                    Ok(())
                }
                TaskOutput::Jobs(jobs) => {
                    let sent = jobs.iter().filter(|j| j.status.is_sent()).count();
                    writeln!(
                        f,
                        "{}: {} sent, {} failed",
                        result.task,
                        sent,
                        jobs.len() - sent
                    )?;
                    for job in jobs {
                        if let DeliveryStatus::Failed { reason } = &job.status {
                            writeln!(f, "- {}: {}", job.recipient.address, reason)?;
                        }
                    }
                    Ok(())
                }
            },
        }
    }
}
