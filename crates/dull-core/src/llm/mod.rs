mod openai;
mod settings;

use anyhow::Result;
use async_trait::async_trait;

pub use openai::OpenAiClient;
pub use settings::{
    LlmSettings, ProviderKind, DEFAULT_ENDPOINT, DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS, TEMPERATURE,
};
pub(crate) use settings::non_blank;

/// Reply returned by [`NoopLlmClient`].
pub const EMPTY_REPORT: &str = r#"{"strategic_violations": []}"#;

/// Chat-completion style backend: one system turn, one user turn, one text reply.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send both prompts and return the model's raw text reply.
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;
}

/// Offline client that reports no violations.
#[derive(Debug, Default, Clone)]
pub struct NoopLlmClient;

#[async_trait]
impl LlmClient for NoopLlmClient {
    async fn complete(&self, _system_prompt: &str, _user_prompt: &str) -> Result<String> {
        Ok(EMPTY_REPORT.to_string())
    }
}

/// Build the client selected by `settings.provider`.
pub fn client_for(settings: &LlmSettings) -> Result<Box<dyn LlmClient>> {
    match settings.provider {
        ProviderKind::OpenAi => Ok(Box::new(OpenAiClient::new(settings)?)),
        ProviderKind::Noop => Ok(Box::new(NoopLlmClient)),
    }
}
