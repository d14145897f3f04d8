//! Test doubles for the dispatch collaborators.
//!
//! - `FixtureFeed`: canned feed records, optionally a sequence
//! - `FixtureNews`: canned news digest or error
//! - `ScriptedGenerator`: replies chosen by substring match on the prompt
//! - `RecordingChannel`: records deliveries, can fail chosen addresses

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use quakewatch_common::{FileConfig, NewsDigest, QuakeResult};
use quakewatch_store::DisasterStore;

use crate::deps::Deps;
use crate::feed::{FeedRecord, QuakeFeed};
use crate::generator::TextGenerator;
use crate::news::{NewsQuery, NewsSearcher};
use crate::notify::{DeliveryChannel, OutboundMessage};
use crate::reference::ReferenceLibrary;

/// A feed record with the key fields set.
pub fn record(date: &str, time: &str, coordinates: &str) -> FeedRecord {
    FeedRecord {
        date: Some(date.to_string()),
        time: Some(time.to_string()),
        coordinates: Some(coordinates.to_string()),
        magnitude: Some("5.2".to_string()),
        depth: Some("10 km".to_string()),
        area: Some("Sumatera Utara".to_string()),
        potential: Some("Tidak berpotensi tsunami".to_string()),
        felt: None,
    }
}

/// Deps wired with `FixtureNews::empty()`, no reference guide and default
/// file config.
pub fn deps(
    feed: Arc<dyn QuakeFeed>,
    store: Arc<dyn DisasterStore>,
    generator: Arc<dyn TextGenerator>,
    channel: Arc<dyn DeliveryChannel>,
) -> Deps {
    Deps::new(
        feed,
        Arc::new(FixtureNews::empty()),
        store,
        generator,
        channel,
        Arc::new(ReferenceLibrary::empty()),
        Arc::new(FileConfig::default()),
    )
}

// --- FixtureFeed ---

/// Returns queued responses in order; the last one repeats.
pub struct FixtureFeed {
    responses: Mutex<VecDeque<QuakeResult<Option<FeedRecord>>>>,
    calls: Mutex<usize>,
}

impl FixtureFeed {
    pub fn new(record: FeedRecord) -> Self {
        Self::sequence(vec![Ok(Some(record))])
    }

    pub fn empty() -> Self {
        Self::sequence(vec![Ok(None)])
    }

    pub fn sequence(responses: Vec<QuakeResult<Option<FeedRecord>>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl QuakeFeed for FixtureFeed {
    async fn fetch_latest(&self) -> QuakeResult<Option<FeedRecord>> {
        *self.calls.lock().unwrap() += 1;
        let mut responses = self.responses.lock().unwrap();
        if responses.len() > 1 {
            return responses.pop_front().unwrap_or(Ok(None));
        }
        responses.front().cloned().unwrap_or(Ok(None))
    }
}

// --- FixtureNews ---

pub struct FixtureNews {
    response: QuakeResult<NewsDigest>,
}

impl FixtureNews {
    pub fn new(digest: NewsDigest) -> Self {
        Self {
            response: Ok(digest),
        }
    }

    pub fn empty() -> Self {
        Self::new(NewsDigest::default())
    }

    pub fn failing(error: quakewatch_common::QuakeError) -> Self {
        Self {
            response: Err(error),
        }
    }
}

#[async_trait]
impl NewsSearcher for FixtureNews {
    async fn search(&self, query: &NewsQuery) -> QuakeResult<NewsDigest> {
        self.response.clone().map(|mut digest| {
            if digest.query.is_empty() {
                digest.query = query.query.clone();
            }
            digest
        })
    }
}

// --- ScriptedGenerator ---

/// Picks the first rule whose needle appears in the system or user prompt.
/// Unmatched prompts get the default reply.
pub struct ScriptedGenerator {
    rules: Vec<(String, std::result::Result<String, String>)>,
    default_reply: String,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedGenerator {
    pub fn new(default_reply: &str) -> Self {
        Self {
            rules: Vec::new(),
            default_reply: default_reply.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn on(mut self, needle: &str, reply: &str) -> Self {
        self.rules.push((needle.to_string(), Ok(reply.to_string())));
        self
    }

    pub fn fail_on(mut self, needle: &str, error: &str) -> Self {
        self.rules.push((needle.to_string(), Err(error.to_string())));
        self
    }

    /// (system, user) pairs in call order.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_matching(&self, needle: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(system, user)| system.contains(needle) || user.contains(needle))
            .count()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, system: &str, user: &str) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((system.to_string(), user.to_string()));

        let rule = self
            .rules
            .iter()
            .find(|(needle, _)| system.contains(needle.as_str()) || user.contains(needle.as_str()));
        match rule {
            Some((_, Ok(reply))) => Ok(reply.clone()),
            Some((_, Err(error))) => Err(anyhow!(error.clone())),
            None => Ok(self.default_reply.clone()),
        }
    }
}

// --- RecordingChannel ---

#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<OutboundMessage>>,
    failing: HashSet<String>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every send to `address` fail.
    pub fn fail_for(mut self, address: &str) -> Self {
        self.failing.insert(address.to_string());
        self
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryChannel for RecordingChannel {
    async fn send(&self, message: &OutboundMessage) -> Result<()> {
        if self.failing.contains(&message.to) {
            return Err(anyhow!("mailbox unavailable: {}", message.to));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}
