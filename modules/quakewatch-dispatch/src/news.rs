use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use quakewatch_common::file_config::NewsConfig;
use quakewatch_common::{NewsArticle, NewsDigest, QuakeError, QuakeResult};

use crate::http::transport_error;

const SERVICE: &str = "tavily";
const TAVILY_SEARCH_URL: &str = "https://api.tavily.com/search";

/// What to ask the news collaborator for.
#[derive(Debug, Clone, PartialEq)]
pub struct NewsQuery {
    pub query: String,
    pub country: String,
    pub max_results: u32,
}

impl From<&NewsConfig> for NewsQuery {
    fn from(config: &NewsConfig) -> Self {
        Self {
            query: config.query.clone(),
            country: config.country.clone(),
            max_results: config.max_results,
        }
    }
}

#[async_trait]
pub trait NewsSearcher: Send + Sync {
    async fn search(&self, query: &NewsQuery) -> QuakeResult<NewsDigest>;
}

/// Tavily news search adapter.
pub struct TavilySearcher {
    api_key: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct TavilySearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: u32,
    topic: &'a str,
    country: &'a str,
    include_answer: bool,
}

#[derive(Debug, Deserialize)]
struct TavilySearchResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    published_date: Option<String>,
}

impl TavilySearcher {
    pub fn new(api_key: String, client: reqwest::Client) -> Self {
        Self { api_key, client }
    }
}

#[async_trait]
impl NewsSearcher for TavilySearcher {
    async fn search(&self, query: &NewsQuery) -> QuakeResult<NewsDigest> {
        let request = TavilySearchRequest {
            api_key: &self.api_key,
            query: &query.query,
            max_results: query.max_results,
            topic: "news",
            country: &query.country,
            include_answer: true,
        };

        let resp = self
            .client
            .post(TAVILY_SEARCH_URL)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Tavily returned non-success");
            return Err(QuakeError::upstream(SERVICE, status));
        }

        let body = resp.text().await.map_err(|e| transport_error(SERVICE, e))?;
        digest_from_body(&query.query, &body)
    }
}

fn digest_from_body(query: &str, body: &str) -> QuakeResult<NewsDigest> {
    let parsed: TavilySearchResponse =
        serde_json::from_str(body).map_err(|e| QuakeError::malformed(SERVICE, e))?;

    Ok(NewsDigest {
        query: query.to_string(),
        answer: parsed.answer.filter(|a| !a.trim().is_empty()),
        articles: parsed
            .results
            .into_iter()
            .map(|r| NewsArticle {
                title: r.title,
                url: r.url,
                content: r.content,
                published_date: r.published_date,
            })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_news_topic_and_country() {
        let request = TavilySearchRequest {
            api_key: "tvly-123",
            query: "Gempa Hari Ini",
            max_results: 5,
            topic: "news",
            country: "indonesia",
            include_answer: true,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["topic"], "news");
        assert_eq!(json["country"], "indonesia");
        assert_eq!(json["max_results"], 5);
    }

    #[test]
    fn parses_results_into_digest() {
        let body = r#"{
            "answer": "Gempa M4.9 mengguncang Sleman.",
            "results": [
                {"title": "Gempa Sleman", "url": "https://news.example/1", "content": "Warga merasakan guncangan.", "published_date": "2024-10-15"}
            ]
        }"#;
        let digest = digest_from_body("Gempa Hari Ini", body).unwrap();
        assert_eq!(digest.answer.as_deref(), Some("Gempa M4.9 mengguncang Sleman."));
        assert_eq!(digest.articles.len(), 1);
        assert_eq!(digest.articles[0].url, "https://news.example/1");
    }

    #[test]
    fn unparsable_body_is_malformed() {
        let err = digest_from_body("q", "not json").unwrap_err();
        assert!(matches!(err, QuakeError::MalformedPayload { service, .. } if service == "tavily"));
    }
}
