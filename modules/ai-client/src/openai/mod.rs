mod client;
pub(crate) mod types;

use crate::traits::Message;
use anyhow::{anyhow, Result};
use std::time::Duration;

use client::OpenAiClient;

// =============================================================================
// OpenAi Agent
// =============================================================================

#[derive(Clone)]
pub struct OpenAi {
    api_key: String,
    pub(crate) model: String,
    base_url: Option<String>,
    temperature: f32,
    top_p: Option<f32>,
    max_tokens: u32,
    http: reqwest::Client,
}

impl OpenAi {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
            temperature: 0.0,
            top_p: None,
            max_tokens: 4096,
            http: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sampling parameters sent with every request.
    pub fn with_sampling(mut self, temperature: f32, top_p: Option<f32>) -> Self {
        self.temperature = temperature;
        self.top_p = top_p;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Bound every request with a client-side timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    /// Get the model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    pub(crate) fn client(&self) -> OpenAiClient {
        let client = OpenAiClient::new(&self.api_key, self.http.clone());
        if let Some(ref url) = self.base_url {
            client.with_base_url(url)
        } else {
            client
        }
    }

    fn request(&self) -> types::ChatRequest {
        let request = types::ChatRequest::new(&self.model);
        if types::uses_max_completion_tokens(&self.model) {
            return request.max_completion_tokens(self.max_tokens);
        }
        let request = request
            .max_tokens(self.max_tokens)
            .temperature(self.temperature);
        match self.top_p {
            Some(top_p) => request.top_p(top_p),
            None => request,
        }
    }

    // =========================================================================
    // Convenience methods
    // =========================================================================

    /// Multi-message chat completion. Returns the first choice's text.
    pub async fn chat(&self, messages: &[Message]) -> Result<String> {
        let request = self
            .request()
            .messages(messages.iter().map(types::WireMessage::from));

        let response = self.client().chat(&request).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| anyhow!("No response content from {}", self.model))
    }

    /// Simple chat completion (system + user).
    pub async fn chat_completion(
        &self,
        system: impl Into<String>,
        user: impl Into<String>,
    ) -> Result<String> {
        self.chat(&[Message::system(system), Message::user(user)])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_new() {
        let ai = OpenAi::new("sk-test", "gpt-4o");
        assert_eq!(ai.model, "gpt-4o");
        assert_eq!(ai.api_key, "sk-test");
        assert_eq!(ai.max_tokens, 4096);
    }

    #[test]
    fn test_openai_with_base_url() {
        let ai = OpenAi::new("sk-test", "vllm-qwen3").with_base_url("https://litellm.example.com/");
        assert_eq!(ai.base_url, Some("https://litellm.example.com/".to_string()));
    }

    #[test]
    fn test_sampling_applied_to_request() {
        let ai = OpenAi::new("sk-test", "vllm-qwen3").with_sampling(0.1, Some(0.1));
        let request = ai.request();
        assert_eq!(request.temperature, Some(0.1));
        assert_eq!(request.top_p, Some(0.1));
        assert_eq!(request.max_tokens, Some(4096));
    }

    #[test]
    fn test_reasoning_models_skip_sampling() {
        let ai = OpenAi::new("sk-test", "gpt-5-mini").with_sampling(0.1, Some(0.1));
        let request = ai.request();
        assert!(request.temperature.is_none());
        assert_eq!(request.max_completion_tokens, Some(4096));
    }
}
