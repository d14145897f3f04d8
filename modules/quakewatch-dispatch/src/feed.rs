//! Seismic feed collaborator and record normalization.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use quakewatch_common::{Event, QuakeError, QuakeResult};

use crate::http::transport_error;

const SERVICE: &str = "bmkg";

/// One raw record as published by the feed. Every field is optional so a
/// partial record still parses and `normalize` can say what is missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedRecord {
    #[serde(rename = "Tanggal", default)]
    pub date: Option<String>,
    #[serde(rename = "Jam", default)]
    pub time: Option<String>,
    #[serde(rename = "Coordinates", default)]
    pub coordinates: Option<String>,
    #[serde(rename = "Magnitude", default)]
    pub magnitude: Option<String>,
    #[serde(rename = "Kedalaman", default)]
    pub depth: Option<String>,
    #[serde(rename = "Wilayah", default)]
    pub area: Option<String>,
    #[serde(rename = "Potensi", default)]
    pub potential: Option<String>,
    #[serde(rename = "Dirasakan", default)]
    pub felt: Option<String>,
}

#[derive(Deserialize)]
struct FeedDocument {
    #[serde(rename = "Infogempa")]
    info: InfoGempa,
}

#[derive(Deserialize)]
struct InfoGempa {
    #[serde(default)]
    gempa: Option<OneOrMany>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<FeedRecord>),
    One(FeedRecord),
}

/// Parse a feed document into its records, newest first as published.
pub fn parse_feed(body: &str) -> QuakeResult<Vec<FeedRecord>> {
    let document: FeedDocument =
        serde_json::from_str(body).map_err(|e| QuakeError::malformed(SERVICE, e))?;
    Ok(match document.info.gempa {
        Some(OneOrMany::Many(records)) => records,
        Some(OneOrMany::One(record)) => vec![record],
        None => Vec::new(),
    })
}

/// Turn a raw record into an `Event`. Date, time and coordinates are required;
/// unparsable magnitude or depth fall back to 0.0.
pub fn normalize(record: &FeedRecord, reported_by: i32) -> QuakeResult<Event> {
    let required = |value: &Option<String>, field: &str| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| QuakeError::malformed(SERVICE, format!("record is missing {field}")))
    };

    let potential_text = record
        .potential
        .as_deref()
        .or(record.felt.as_deref())
        .unwrap_or_default()
        .trim()
        .to_string();

    Ok(Event {
        event_date: required(&record.date, "Tanggal")?,
        event_time: required(&record.time, "Jam")?,
        coordinates: required(&record.coordinates, "Coordinates")?,
        magnitude: parse_number(record.magnitude.as_deref()),
        depth_km: parse_depth(record.depth.as_deref()),
        area: record.area.as_deref().unwrap_or_default().trim().to_string(),
        tsunami_potential: has_tsunami_potential(record.potential.as_deref().unwrap_or_default()),
        potential_text,
        reported_by,
    })
}

fn parse_number(text: Option<&str>) -> f64 {
    text.and_then(|t| t.trim().parse().ok()).unwrap_or(0.0)
}

/// "10 km" -> 10.0
fn parse_depth(text: Option<&str>) -> f64 {
    let stripped = text.map(|t| {
        let lower = t.trim().to_lowercase();
        lower.trim_end_matches("km").trim().to_string()
    });
    parse_number(stripped.as_deref())
}

fn has_tsunami_potential(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("tsunami") && !lower.contains("tidak berpotensi")
}

// ---------------------------------------------------------------------------
// Feed collaborator
// ---------------------------------------------------------------------------

#[async_trait]
pub trait QuakeFeed: Send + Sync {
    /// The first record of the feed, or `None` when it lists no events.
    async fn fetch_latest(&self) -> QuakeResult<Option<FeedRecord>>;
}

/// BMKG "gempa dirasakan" JSON feed.
pub struct BmkgFeed {
    url: String,
    client: reqwest::Client,
}

impl BmkgFeed {
    pub fn new(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            client,
        }
    }
}

#[async_trait]
impl QuakeFeed for BmkgFeed {
    async fn fetch_latest(&self) -> QuakeResult<Option<FeedRecord>> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            warn!(status = %status, url = %self.url, "Feed returned non-success");
            return Err(QuakeError::upstream(SERVICE, status));
        }

        let body = resp.text().await.map_err(|e| transport_error(SERVICE, e))?;
        let records = parse_feed(&body)?;
        debug!(records = records.len(), "Fetched feed");
        Ok(records.into_iter().next())
    }
}
