//! Per-recipient message rendering.

use std::sync::Arc;

use async_trait::async_trait;

use ai_client::util::truncate_to_char_boundary;
use quakewatch_common::file_config::MessagesConfig;
use quakewatch_common::{Event, NewsDigest, QuakeError, QuakeResult, Recipient};

use crate::generator::TextGenerator;

pub const ALERT_MAX_WORDS: usize = 50;
pub const REPORT_MAX_WORDS: usize = 200;

/// Max bytes of each article body quoted into a report prompt.
const ARTICLE_SNIPPET_BYTES: usize = 600;

/// Everything a builder may draw on for one notification event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventContext {
    pub event: Event,
    pub news: Option<NewsDigest>,
    pub reference: Option<String>,
}

impl EventContext {
    pub fn new(event: Event) -> Self {
        Self {
            event,
            news: None,
            reference: None,
        }
    }

    pub fn with_news(mut self, news: NewsDigest) -> Self {
        self.news = Some(news);
        self
    }

    pub fn with_reference(mut self, reference: Option<String>) -> Self {
        self.reference = reference;
        self
    }
}

#[async_trait]
pub trait MessageBuilder: Send + Sync {
    async fn build(&self, recipient: &Recipient, context: &EventContext) -> QuakeResult<String>;
}

// ---------------------------------------------------------------------------
// Alert
// ---------------------------------------------------------------------------

/// Short public alert for citizens.
pub struct AlertComposer {
    generator: Arc<dyn TextGenerator>,
    messages: MessagesConfig,
}

impl AlertComposer {
    pub fn new(generator: Arc<dyn TextGenerator>, messages: MessagesConfig) -> Self {
        Self {
            generator,
            messages,
        }
    }

    fn system_prompt(&self) -> String {
        format!(
            "You write short earthquake alert messages for members of the public.\n\
             Write in {language}. Use at most {max} words.\n\
             Be empathetic, calm and clear. Cite {source} as the source of the data.\n\
             Use only the official data you are given. Do not predict aftershocks \
             or add any unofficial information.\n\
             Address the recipient by name. Reply with the message body only.",
            language = self.messages.language,
            max = ALERT_MAX_WORDS,
            source = self.messages.source_name,
        )
    }
}

#[async_trait]
impl MessageBuilder for AlertComposer {
    async fn build(&self, recipient: &Recipient, context: &EventContext) -> QuakeResult<String> {
        let user = format!(
            "Recipient: {}\n\nOfficial {} data:\n{}",
            recipient.display_name,
            self.messages.source_name,
            describe_event(&context.event),
        );
        let text = self
            .generator
            .generate(&self.system_prompt(), &user)
            .await
            .map_err(|e| QuakeError::Generation(e.to_string()))?;
        finish(&text, ALERT_MAX_WORDS)
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Situation report for response organizations.
pub struct ReportComposer {
    generator: Arc<dyn TextGenerator>,
    messages: MessagesConfig,
}

impl ReportComposer {
    pub fn new(generator: Arc<dyn TextGenerator>, messages: MessagesConfig) -> Self {
        Self {
            generator,
            messages,
        }
    }

    fn system_prompt(&self) -> String {
        format!(
            "You write earthquake situation reports for disaster response organizations.\n\
             Write in {language}. Use at most {max} words.\n\
             The report must contain:\n\
             1. The official event data from {source}.\n\
             2. The impact on the community, based on the news provided.\n\
             3. Recommended emergency actions for response organizations, based on \
             the reference guide when one is provided.\n\
             Do not invent casualties or damage that the sources do not mention.\n\
             Address the recipient organization by name. Reply with the report body only.",
            language = self.messages.language,
            max = REPORT_MAX_WORDS,
            source = self.messages.source_name,
        )
    }
}

#[async_trait]
impl MessageBuilder for ReportComposer {
    async fn build(&self, recipient: &Recipient, context: &EventContext) -> QuakeResult<String> {
        let user = format!(
            "Recipient: {}\n\nOfficial {} data:\n{}\n\nNews:\n{}\n\nReference guide:\n{}",
            recipient.display_name,
            self.messages.source_name,
            describe_event(&context.event),
            describe_news(context.news.as_ref()),
            context.reference.as_deref().unwrap_or("(no reference available)"),
        );
        let text = self
            .generator
            .generate(&self.system_prompt(), &user)
            .await
            .map_err(|e| QuakeError::Generation(e.to_string()))?;
        finish(&text, REPORT_MAX_WORDS)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn describe_event(event: &Event) -> String {
    format!(
        "Date: {}\nTime: {}\nCoordinates: {}\nMagnitude: {:.1}\nDepth: {:.0} km\nArea: {}\nTsunami potential: {}\nNotes: {}",
        event.event_date,
        event.event_time,
        event.coordinates,
        event.magnitude,
        event.depth_km,
        event.area,
        if event.tsunami_potential { "yes" } else { "no" },
        event.potential_text,
    )
}

fn describe_news(news: Option<&NewsDigest>) -> String {
    let Some(news) = news else {
        return "(no news available)".to_string();
    };
    let mut lines = Vec::new();
    if let Some(answer) = &news.answer {
        lines.push(answer.clone());
    }
    for article in &news.articles {
        lines.push(format!(
            "- {} ({}): {}",
            article.title,
            article.url,
            truncate_to_char_boundary(article.content.trim(), ARTICLE_SNIPPET_BYTES)
        ));
    }
    if lines.is_empty() {
        return "(no news available)".to_string();
    }
    lines.join("\n")
}

fn finish(text: &str, max_words: usize) -> QuakeResult<String> {
    let text = limit_words(text.trim(), max_words);
    if text.is_empty() {
        return Err(QuakeError::Generation("empty message".into()));
    }
    Ok(text.to_string())
}

/// Cut `text` after `max_words` whitespace-separated words, keeping the
/// original line breaks.
pub fn limit_words(text: &str, max_words: usize) -> &str {
    let mut words = 0;
    let mut in_word = false;
    for (idx, c) in text.char_indices() {
        if c.is_whitespace() {
            in_word = false;
        } else if !in_word {
            in_word = true;
            words += 1;
            if words > max_words {
                return text[..idx].trim_end();
            }
        }
    }
    text
}
