use ai_client::OpenAi;
use async_trait::async_trait;

/// Dyn-compatible text generation (wraps `ai_client::OpenAi`).
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// One completion from a system instruction and a user message.
    async fn generate(&self, system: &str, user: &str) -> anyhow::Result<String>;
}

#[async_trait]
impl TextGenerator for OpenAi {
    async fn generate(&self, system: &str, user: &str) -> anyhow::Result<String> {
        self.chat_completion(system, user).await
    }
}
