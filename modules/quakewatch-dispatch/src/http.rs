use std::time::Duration;

use quakewatch_common::{QuakeError, QuakeResult};

/// Shared HTTP client for the feed and news collaborators.
pub fn build_client(timeout: Duration) -> QuakeResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("quakewatch/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| QuakeError::Config(format!("failed to build HTTP client: {e}")))
}

pub(crate) fn transport_error(service: &str, err: reqwest::Error) -> QuakeError {
    if err.is_timeout() {
        return QuakeError::upstream(service, "request timed out");
    }
    QuakeError::upstream(service, err)
}
