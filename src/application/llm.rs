//! Provider-neutral text generation seam.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::application::json_repair::parse_lenient;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum LlmError {
    #[error("llm request failed: {0}")]
    Http(String),
    #[error("llm provider returned HTTP {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("llm returned an empty completion")]
    EmptyCompletion,
    #[error("llm output is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("llm provider `{0}` is not configured")]
    NotConfigured(&'static str),
}

/// One completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmPrompt {
    pub system: Option<String>,
    pub prompt: String,
    /// Ask the provider for a JSON document instead of prose.
    pub json_output: bool,
}

impl LlmPrompt {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            json_output: false,
        }
    }

    pub fn json(prompt: impl Into<String>) -> Self {
        Self {
            json_output: true,
            ..Self::text(prompt)
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Provider name used in logs.
    fn provider(&self) -> &'static str;

    /// Raw completion text; never empty on success.
    async fn complete(&self, prompt: &LlmPrompt) -> Result<String, LlmError>;

    /// Completion parsed as JSON after fence stripping and comma repair.
    async fn complete_json(&self, prompt: &LlmPrompt) -> Result<Value, LlmError> {
        let text = self.complete(prompt).await?;
        parse_lenient(&text).map_err(|err| LlmError::InvalidJson(err.to_string()))
    }
}

/// Stand-in used when no provider key is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledLlm;

#[async_trait]
impl LlmClient for DisabledLlm {
    fn provider(&self) -> &'static str {
        "disabled"
    }

    async fn complete(&self, _prompt: &LlmPrompt) -> Result<String, LlmError> {
        Err(LlmError::NotConfigured("llm"))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct Canned(&'static str);

    #[async_trait]
    impl LlmClient for Canned {
        fn provider(&self) -> &'static str {
            "canned"
        }

        async fn complete(&self, _prompt: &LlmPrompt) -> Result<String, LlmError> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn complete_json_repairs_fenced_output() {
        let client = Canned("```json\n{\"headline\": \"Hi\", \"tags\": [\"a\",],}\n```");
        let value = client
            .complete_json(&LlmPrompt::json("mockup"))
            .await
            .expect("repairable");
        assert_eq!(value, json!({"headline": "Hi", "tags": ["a"]}));
    }

    #[tokio::test]
    async fn complete_json_reports_unparseable_text() {
        let client = Canned("I cannot help with that.");
        let err = client
            .complete_json(&LlmPrompt::json("mockup"))
            .await
            .expect_err("not json");
        assert!(matches!(err, LlmError::InvalidJson(_)));
    }

    #[tokio::test]
    async fn disabled_client_is_not_configured() {
        let err = DisabledLlm
            .complete(&LlmPrompt::text("hello"))
            .await
            .expect_err("disabled");
        assert_eq!(err, LlmError::NotConfigured("llm"));
    }
}
