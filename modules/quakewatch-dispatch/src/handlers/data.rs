use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use quakewatch_common::{QuakeError, QuakeResult};
use quakewatch_store::DisasterStore;

use crate::deps::Deps;
use crate::dispatcher::{Handler, Inputs, TaskOutput};
use crate::feed::{normalize, QuakeFeed};
use crate::graph::Step;

/// Fetches the newest feed record, normalizes it and upserts it.
pub struct DataFetchHandler {
    feed: Arc<dyn QuakeFeed>,
    store: Arc<dyn DisasterStore>,
    reported_by: i32,
}

impl DataFetchHandler {
    pub fn from_deps(deps: &Deps) -> Self {
        Self {
            feed: deps.feed.clone(),
            store: deps.store.clone(),
            reported_by: deps.file_config.feed.reported_by,
        }
    }
}

#[async_trait]
impl Handler for DataFetchHandler {
    async fn run(&self, _step: &Step, _inputs: &Inputs, _request: &str) -> QuakeResult<TaskOutput> {
        let record = self.feed.fetch_latest().await?.ok_or(QuakeError::NoData)?;
        let event = normalize(&record, self.reported_by)?;
        let stored = self.store.upsert_event(&event).await?;

        info!(
            fingerprint = %stored.fingerprint(),
            magnitude = stored.magnitude,
            area = %stored.area,
            "Latest event stored"
        );
        Ok(TaskOutput::Event(stored))
    }
}
