use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use ai_client::util::strip_code_blocks;
use quakewatch_common::file_config::RecipientsConfig;
use quakewatch_common::{AudienceKind, QuakeError, QuakeResult, Recipient, Row, TaskIdentity};
use quakewatch_store::DisasterStore;

use crate::deps::Deps;
use crate::dispatcher::{Handler, Inputs, TaskOutput};
use crate::generator::TextGenerator;
use crate::graph::Step;

const ADDRESS_KEYS: &[&str] = &["email", "address", "email_address"];
const NAME_KEYS: &[&str] = &["name", "display_name", "full_name", "nama"];

/// Translates a request into SQL over the advertised catalog, validates it,
/// and runs it read-only.
pub struct RecipientQueryHandler {
    store: Arc<dyn DisasterStore>,
    generator: Arc<dyn TextGenerator>,
    tables: RecipientsConfig,
}

impl RecipientQueryHandler {
    pub fn from_deps(deps: &Deps) -> Self {
        Self {
            store: deps.store.clone(),
            generator: deps.generator.clone(),
            tables: deps.file_config.recipients.clone(),
        }
    }

    /// Fixed request used when the query runs as a prerequisite.
    fn audience_request(&self, audience: AudienceKind) -> String {
        let table = match audience {
            AudienceKind::Citizen => &self.tables.citizen_table,
            AudienceKind::Organization => &self.tables.organization_table,
        };
        format!("List the email and name of every row in the `{table}` table.")
    }
}

#[async_trait]
impl Handler for RecipientQueryHandler {
    async fn run(&self, step: &Step, _inputs: &Inputs, request: &str) -> QuakeResult<TaskOutput> {
        let request = match step.audience {
            Some(audience) => self.audience_request(audience),
            None if request.trim().is_empty() => {
                return Err(QuakeError::MissingInput {
                    task: TaskIdentity::RecipientQuery,
                    input: "request".into(),
                })
            }
            None => request.trim().to_string(),
        };

        let catalog = self.store.catalog().await?;
        let system = format!(
            "You translate requests into one PostgreSQL SELECT statement.\n\
             Only these tables and columns exist:\n{}\n\
             Never modify data. Do not use subqueries, comments or functions other than \
             count, lower, upper, coalesce, trim, length, min and max.\n\
             Reply with the SQL statement only.",
            catalog.describe()
        );

        let generated = self
            .generator
            .generate(&system, &request)
            .await
            .map_err(|e| QuakeError::Generation(e.to_string()))?;
        let statement = strip_code_blocks(&generated);
        debug!(%request, %statement, "Translated request");

        let query = catalog.validate(statement)?;
        let rows = self.store.query_readonly(&query).await?;
        info!(tables = ?query.tables(), rows = rows.len(), "Recipient query complete");
        Ok(TaskOutput::Rows(rows))
    }
}

/// Rows to recipients, deduplicated by address (case-insensitive) in row
/// order. Rows without an address are skipped.
pub fn recipients_from_rows(rows: &[Row], audience: AudienceKind) -> Vec<Recipient> {
    let mut seen = HashSet::new();
    let mut recipients = Vec::new();

    for row in rows {
        let Some(address) = first_text(row, ADDRESS_KEYS) else {
            debug!(?row, "Row has no address, skipping");
            continue;
        };
        if !seen.insert(address.to_lowercase()) {
            continue;
        }
        let display_name = first_text(row, NAME_KEYS).unwrap_or_else(|| address.clone());
        recipients.push(Recipient {
            address,
            display_name,
            audience,
        });
    }

    recipients
}

fn first_text(row: &Row, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| row.get(*key))
        .find_map(|value| match value {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        })
}
