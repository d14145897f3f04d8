//! Disaster-guide excerpts used to ground situation reports.

use std::path::Path;

use ai_client::util::truncate_to_char_boundary;
use quakewatch_common::{QuakeError, QuakeResult};

const PDF_MAGIC: &[u8] = b"%PDF-";

/// A plain-text guide split into paragraphs. Retrieval is keyword overlap,
/// scored per paragraph.
#[derive(Debug, Clone, Default)]
pub struct ReferenceLibrary {
    paragraphs: Vec<String>,
}

impl ReferenceLibrary {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_text(text: &str) -> Self {
        let paragraphs = text
            .split("\n\n")
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        Self { paragraphs }
    }

    /// Load a plain-text or markdown guide. PDF guides must be converted to
    /// text first (e.g. `pdftotext -layout guide.pdf guide.txt`).
    pub fn load(path: &Path) -> QuakeResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            QuakeError::Config(format!("failed to read reference guide {}: {e}", path.display()))
        })?;
        if bytes.starts_with(PDF_MAGIC) {
            return Err(QuakeError::Config(format!(
                "reference guide {} is a PDF; convert it to text first \
                 (e.g. `pdftotext -layout guide.pdf guide.txt`)",
                path.display()
            )));
        }
        let text = String::from_utf8(bytes).map_err(|_| {
            QuakeError::Config(format!("reference guide {} is not UTF-8 text", path.display()))
        })?;
        Ok(Self::from_text(&text))
    }

    pub fn is_empty(&self) -> bool {
        self.paragraphs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.paragraphs.len()
    }

    /// Best-matching paragraphs for `query`, joined and capped at `max_chars`
    /// bytes. `None` when nothing matches.
    pub fn excerpt(&self, query: &str, max_chars: usize) -> Option<String> {
        let query_tokens: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .map(|s| s.to_string())
            .collect();
        if query_tokens.is_empty() || max_chars == 0 {
            return None;
        }

        let mut scored: Vec<(usize, &String)> = self
            .paragraphs
            .iter()
            .map(|paragraph| {
                let lower = paragraph.to_lowercase();
                let score = query_tokens
                    .iter()
                    .map(|token| lower.matches(token.as_str()).count())
                    .sum();
                (score, paragraph)
            })
            .filter(|(score, _)| *score > 0)
            .collect();

        // Stable sort keeps document order among equal scores.
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        let mut excerpt = String::new();
        for (_, paragraph) in scored {
            let separator = if excerpt.is_empty() { 0 } else { 2 };
            if excerpt.len() + separator + paragraph.len() > max_chars {
                if excerpt.is_empty() {
                    excerpt.push_str(truncate_to_char_boundary(paragraph, max_chars));
                }
                break;
            }
            if separator > 0 {
                excerpt.push_str("\n\n");
            }
            excerpt.push_str(paragraph);
        }

        (!excerpt.is_empty()).then_some(excerpt)
    }
}
