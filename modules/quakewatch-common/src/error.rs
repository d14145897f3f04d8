//! Typed errors for handlers, dispatch and delivery.

use std::time::Duration;

use thiserror::Error;

use crate::types::TaskIdentity;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum QuakeError {
    /// Non-success status or network failure from an external service.
    #[error("{service} upstream error: {status}")]
    Upstream { service: String, status: String },

    /// Response body could not be parsed.
    #[error("malformed payload from {service}: {reason}")]
    MalformedPayload { service: String, reason: String },

    /// The feed returned no events.
    #[error("feed returned no events")]
    NoData,

    /// A generated query failed allow-list validation.
    #[error("query translation rejected: {0}")]
    QueryTranslation(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Transport failure for a single recipient.
    #[error("delivery to {address} failed: {reason}")]
    Delivery { address: String, reason: String },

    /// The text-generation capability failed or returned nothing usable.
    #[error("generation failed: {0}")]
    Generation(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    /// A composite task's prerequisite did not complete.
    #[error("prerequisite {task} failed: {source}")]
    PrerequisiteFailure {
        task: TaskIdentity,
        #[source]
        source: Box<QuakeError>,
    },

    /// A task ran without an input its prerequisites should have produced.
    #[error("{task} is missing its {input} input")]
    MissingInput { task: TaskIdentity, input: String },

    #[error("configuration error: {0}")]
    Config(String),
}

impl QuakeError {
    pub fn upstream(service: impl Into<String>, status: impl ToString) -> Self {
        Self::Upstream {
            service: service.into(),
            status: status.to_string(),
        }
    }

    pub fn malformed(service: impl Into<String>, reason: impl ToString) -> Self {
        Self::MalformedPayload {
            service: service.into(),
            reason: reason.to_string(),
        }
    }

    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            after,
        }
    }

    pub fn prerequisite(task: TaskIdentity, source: QuakeError) -> Self {
        Self::PrerequisiteFailure {
            task,
            source: Box::new(source),
        }
    }

    /// The innermost error, unwrapping prerequisite failures.
    pub fn root_cause(&self) -> &QuakeError {
        match self {
            QuakeError::PrerequisiteFailure { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

pub type QuakeResult<T> = std::result::Result<T, QuakeError>;
