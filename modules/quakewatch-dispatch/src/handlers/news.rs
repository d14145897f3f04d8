use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use quakewatch_common::QuakeResult;

use crate::deps::Deps;
use crate::dispatcher::{Handler, Inputs, TaskOutput};
use crate::graph::Step;
use crate::news::{NewsQuery, NewsSearcher};

/// Searches recent earthquake news with the configured query.
pub struct NewsFetchHandler {
    news: Arc<dyn NewsSearcher>,
    query: NewsQuery,
}

impl NewsFetchHandler {
    pub fn from_deps(deps: &Deps) -> Self {
        Self {
            news: deps.news.clone(),
            query: NewsQuery::from(&deps.file_config.news),
        }
    }
}

#[async_trait]
impl Handler for NewsFetchHandler {
    async fn run(&self, _step: &Step, _inputs: &Inputs, _request: &str) -> QuakeResult<TaskOutput> {
        let digest = self.news.search(&self.query).await?;
        info!(query = %digest.query, articles = digest.articles.len(), "News fetched");
        Ok(TaskOutput::News(digest))
    }
}
