use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{QuakeError, QuakeResult};

/// TOML-backed tunables. Every field has a default, so an absent file or an
/// empty table yields a working configuration. Secrets stay in env vars.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub feed: FeedConfig,
    pub news: NewsConfig,
    pub dispatch: DispatchConfig,
    pub recipients: RecipientsConfig,
    pub messages: MessagesConfig,
    pub reference: ReferenceConfig,
    pub llm: LlmConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeedConfig {
    pub url: String,
    /// Attribution id written with newly seen events.
    pub reported_by: i32,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: "https://data.bmkg.go.id/DataMKG/TEWS/gempadirasakan.json".to_string(),
            reported_by: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NewsConfig {
    pub query: String,
    pub country: String,
    pub max_results: u32,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            query: "Gempa Hari Ini".to_string(),
            country: "indonesia".to_string(),
            max_results: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatchConfig {
    pub poll_interval_secs: u64,
    /// Upper bound for any single external call.
    pub call_timeout_secs: u64,
    /// Max recipients rendered and delivered at once.
    pub fanout_concurrency: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            call_timeout_secs: 30,
            fanout_concurrency: 4,
        }
    }
}

impl DispatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecipientsConfig {
    pub citizen_table: String,
    pub organization_table: String,
}

impl Default for RecipientsConfig {
    fn default() -> Self {
        Self {
            citizen_table: "citizen".to_string(),
            organization_table: "org".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MessagesConfig {
    /// Language the generated alerts and reports are written in.
    pub language: String,
    pub alert_subject: String,
    pub report_subject: String,
    /// Source named in every alert.
    pub source_name: String,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            language: "Indonesian".to_string(),
            alert_subject: "PERINGATAN GEMPA BUMI".to_string(),
            report_subject: "LAPORAN GEMPA BUMI".to_string(),
            source_name: "BMKG".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReferenceConfig {
    /// Plain-text disaster guide used to ground reports.
    pub guide_path: Option<PathBuf>,
    pub query: String,
    pub max_chars: usize,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            guide_path: None,
            query: "gempa".to_string(),
            max_chars: 4000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LlmConfig {
    pub temperature: f32,
    pub top_p: Option<f32>,
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            top_p: Some(0.1),
            max_tokens: 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub max_connections: u32,
    /// Applied to every guarded read-only query.
    pub statement_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            statement_timeout_ms: 5000,
        }
    }
}

/// Load and parse a TOML config file.
pub fn load_config(path: &Path) -> QuakeResult<FileConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        QuakeError::Config(format!("failed to read config file {}: {e}", path.display()))
    })?;
    parse_config(&content)
        .map_err(|e| QuakeError::Config(format!("{} ({})", e, path.display())))
}

pub fn parse_config(content: &str) -> QuakeResult<FileConfig> {
    toml::from_str(content)
        .map_err(|e| QuakeError::Config(format!("failed to parse config: {e}")))
}
