use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::{llm::LlmClient, prompt::PromptPair};

/// Message placed in [`LintResult::ParseFailure`].
pub const PARSE_FAILURE_MESSAGE: &str = "Failed to parse LLM response as JSON";

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```[A-Za-z0-9_-]*[ \t]*\r?\n(.*?)\s*```$").expect("code fence regex is valid")
});

/// Outcome of one lint request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LintResult {
    /// The model's reply, parsed as JSON.
    Report(serde_json::Value),
    /// The reply was not JSON; `raw_response` holds it verbatim.
    ParseFailure { error: String, raw_response: String },
}

impl LintResult {
    /// Parse a model reply. A reply wrapped in a single Markdown code fence is
    /// unwrapped first.
    pub fn from_reply(reply: &str) -> Self {
        let trimmed = reply.trim();
        let body = CODE_FENCE
            .captures(trimmed)
            .and_then(|caps| caps.get(1))
            .map_or(trimmed, |m| m.as_str());
        match serde_json::from_str(body) {
            Ok(value) => Self::Report(value),
            Err(err) => {
                warn!(error = %err, "model reply is not valid JSON");
                Self::ParseFailure {
                    error: PARSE_FAILURE_MESSAGE.to_string(),
                    raw_response: reply.to_string(),
                }
            }
        }
    }

    pub fn is_parse_failure(&self) -> bool {
        matches!(self, Self::ParseFailure { .. })
    }
}

/// Send the prompts through `client` and parse the reply.
///
/// Transport and authentication failures are returned as errors; a reply that
/// is not JSON is not an error.
#[instrument(skip_all)]
pub async fn lint_code(client: &dyn LlmClient, prompts: &PromptPair) -> Result<LintResult> {
    let reply = client
        .complete(&prompts.system_prompt, &prompts.user_prompt)
        .await?;
    info!(reply_chars = reply.chars().count(), "received model reply");
    Ok(LintResult::from_reply(&reply))
}
