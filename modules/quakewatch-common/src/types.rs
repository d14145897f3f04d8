use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::fmt;

// --- Events ---

/// A normalized seismic event.
///
/// `(event_date, event_time, coordinates)` is the natural key: two records
/// sharing it describe the same physical occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Date text as reported by the feed (e.g. "2024-01-01", "15 Okt 2024").
    pub event_date: String,
    /// Clock text as reported by the feed (e.g. "08:00:00 WIB").
    pub event_time: String,
    pub coordinates: String,
    pub magnitude: f64,
    pub depth_km: f64,
    pub area: String,
    pub tsunami_potential: bool,
    /// Free-text potential/felt description from the feed.
    pub potential_text: String,
    /// Source attribution. Kept from the first upsert of a natural key.
    pub reported_by: i32,
}

impl Event {
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint(format!(
            "{}{}{}",
            self.event_date, self.event_time, self.coordinates
        ))
    }

    /// Clock time parsed from the first token of `event_time`.
    /// Unparsable text resolves to midnight.
    pub fn clock_time(&self) -> NaiveTime {
        self.event_time
            .split_whitespace()
            .next()
            .and_then(|clock| NaiveTime::parse_from_str(clock, "%H:%M:%S").ok())
            .unwrap_or(NaiveTime::MIN)
    }

    /// Natural key as persisted: (date text, parsed clock, coordinates).
    pub fn natural_key(&self) -> (String, NaiveTime, String) {
        (
            self.event_date.clone(),
            self.clock_time(),
            self.coordinates.clone(),
        )
    }
}

/// Change-detection identity of an event: date ++ time ++ coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(pub String);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// --- Recipients ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudienceKind {
    Citizen,
    Organization,
}

impl fmt::Display for AudienceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudienceKind::Citizen => write!(f, "citizen"),
            AudienceKind::Organization => write!(f, "organization"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub address: String,
    pub display_name: String,
    pub audience: AudienceKind,
}

/// One result row of a read-only query: column name to value.
pub type Row = serde_json::Map<String, serde_json::Value>;

// --- Tasks ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskIdentity {
    DataFetch,
    NewsFetch,
    RecipientQuery,
    Alert,
    Report,
}

impl TaskIdentity {
    pub const ALL: [TaskIdentity; 5] = [
        TaskIdentity::DataFetch,
        TaskIdentity::NewsFetch,
        TaskIdentity::RecipientQuery,
        TaskIdentity::Alert,
        TaskIdentity::Report,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TaskIdentity::DataFetch => "DataFetch",
            TaskIdentity::NewsFetch => "NewsFetch",
            TaskIdentity::RecipientQuery => "RecipientQuery",
            TaskIdentity::Alert => "Alert",
            TaskIdentity::Report => "Report",
        }
    }
}

impl fmt::Display for TaskIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// --- News ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewsDigest {
    pub query: String,
    pub answer: Option<String>,
    pub articles: Vec<NewsArticle>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub title: String,
    pub url: String,
    pub content: String,
    pub published_date: Option<String>,
}

// --- Notifications ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed { reason: String },
}

impl DeliveryStatus {
    pub fn is_sent(&self) -> bool {
        matches!(self, DeliveryStatus::Sent)
    }
}

/// Per-recipient unit of fanout work and its outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationJob {
    pub recipient: Recipient,
    pub rendered_content: Option<String>,
    pub status: DeliveryStatus,
}

impl NotificationJob {
    pub fn pending(recipient: Recipient) -> Self {
        Self {
            recipient,
            rendered_content: None,
            status: DeliveryStatus::Pending,
        }
    }

    pub fn sent(mut self, content: String) -> Self {
        self.rendered_content = Some(content);
        self.status = DeliveryStatus::Sent;
        self
    }

    pub fn failed(mut self, reason: impl Into<String>) -> Self {
        self.status = DeliveryStatus::Failed {
            reason: reason.into(),
        };
        self
    }
}
