//! In-memory `DisasterStore` for tests and dry runs.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveTime;
use serde_json::Value;

use quakewatch_common::{Event, QuakeError, QuakeResult, Row};

use crate::guard::{Catalog, Projection, ReadOnlyQuery};
use crate::traits::DisasterStore;

const DISASTER_COLUMNS: &[&str] = &[
    "event_date",
    "event_time",
    "coordinates",
    "magnitude",
    "depth",
    "area",
    "tsunami_potential",
    "reported_by",
];

type NaturalKey = (String, NaiveTime, String);

struct SeededTable {
    columns: Vec<String>,
    rows: Vec<Row>,
}

struct Inner {
    events: BTreeMap<NaturalKey, Event>,
    tables: BTreeMap<String, SeededTable>,
    executed: Vec<String>,
    unavailable: bool,
}

/// Events are keyed by natural key; recipient tables are seeded up front.
/// Queries project the first referenced table's rows and ignore filters.
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                events: BTreeMap::new(),
                tables: BTreeMap::new(),
                executed: Vec::new(),
                unavailable: false,
            }),
        }
    }

    /// Seed a table. Rows are objects keyed by column name.
    pub fn with_table(self, name: &str, columns: &[&str], rows: Vec<Value>) -> Self {
        let rows = rows
            .into_iter()
            .filter_map(|row| match row {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect();
        self.inner.lock().unwrap().tables.insert(
            name.to_lowercase(),
            SeededTable {
                columns: columns.iter().map(|c| c.to_lowercase()).collect(),
                rows,
            },
        );
        self
    }

    /// Make every call fail as if the database were unreachable.
    pub fn unavailable(self) -> Self {
        self.inner.lock().unwrap().unavailable = true;
        self
    }

    // --- Assertion helpers ---

    pub fn events(&self) -> Vec<Event> {
        self.inner.lock().unwrap().events.values().cloned().collect()
    }

    pub fn event_count(&self) -> usize {
        self.inner.lock().unwrap().events.len()
    }

    /// SQL text of every statement that reached `query_readonly`.
    pub fn executed(&self) -> Vec<String> {
        self.inner.lock().unwrap().executed.clone()
    }
}

fn check_available(inner: &Inner) -> QuakeResult<()> {
    if inner.unavailable {
        return Err(QuakeError::StoreUnavailable("memory store marked unavailable".into()));
    }
    Ok(())
}

#[async_trait]
impl DisasterStore for MemoryStore {
    async fn upsert_event(&self, event: &Event) -> QuakeResult<Event> {
        let mut inner = self.inner.lock().unwrap();
        check_available(&inner)?;

        let stored = match inner.events.get(&event.natural_key()) {
            Some(existing) => Event {
                reported_by: existing.reported_by,
                ..event.clone()
            },
            None => event.clone(),
        };
        inner.events.insert(event.natural_key(), stored.clone());
        Ok(stored)
    }

    async fn catalog(&self) -> QuakeResult<Catalog> {
        let inner = self.inner.lock().unwrap();
        check_available(&inner)?;

        let mut catalog = Catalog::new().with_table("disaster", DISASTER_COLUMNS.iter().copied());
        for (name, table) in &inner.tables {
            catalog = catalog.with_table(name, table.columns.iter().cloned());
        }
        Ok(catalog)
    }

    async fn query_readonly(&self, query: &ReadOnlyQuery) -> QuakeResult<Vec<Row>> {
        let mut inner = self.inner.lock().unwrap();
        check_available(&inner)?;
        inner.executed.push(query.sql().to_string());

        let Some(table_name) = query.tables().first() else {
            return Ok(Vec::new());
        };
        let Some(table) = inner.tables.get(table_name) else {
            return Err(QuakeError::Store(format!("relation \"{table_name}\" does not exist")));
        };

        let rows = table
            .rows
            .iter()
            .map(|row| match query.projection() {
                Projection::All => row.clone(),
                Projection::Columns(columns) => columns
                    .iter()
                    .map(|column| {
                        let value = column
                            .source
                            .as_ref()
                            .and_then(|source| row.get(source))
                            .cloned()
                            .unwrap_or(Value::Null);
                        (column.output.clone(), value)
                    })
                    .collect(),
            })
            .collect();
        Ok(rows)
    }
}
