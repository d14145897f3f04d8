use async_trait::async_trait;

use quakewatch_common::{Event, QuakeResult, Row};

use crate::guard::{Catalog, ReadOnlyQuery};

/// Storage seam for events and recipient lookups.
#[async_trait]
pub trait DisasterStore: Send + Sync {
    /// Insert or update by natural key. Returns the event as persisted;
    /// `reported_by` keeps the value from the first insert.
    async fn upsert_event(&self, event: &Event) -> QuakeResult<Event>;

    /// Tables and columns the store is willing to expose to generated queries.
    async fn catalog(&self) -> QuakeResult<Catalog>;

    /// Execute a validated statement without side effects.
    async fn query_readonly(&self, query: &ReadOnlyQuery) -> QuakeResult<Vec<Row>>;
}
