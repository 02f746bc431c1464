//! Gemini and OpenAI completion providers.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::application::llm::{LlmClient, LlmError, LlmPrompt};

/// Connection details shared by both providers.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: Url,
    pub timeout: Duration,
}

fn http_client(timeout: Duration) -> Result<Client, LlmError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("marketdesk/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|err| LlmError::Http(err.to_string()))
}

fn endpoint(base: &Url, path: &str) -> Result<Url, LlmError> {
    base.join(path)
        .map_err(|err| LlmError::Http(format!("invalid provider url: {err}")))
}

async fn post_json<B: Serialize + ?Sized>(
    provider: &'static str,
    request: reqwest::RequestBuilder,
    body: &B,
) -> Result<Value, LlmError> {
    let response = request
        .json(body)
        .send()
        .await
        .map_err(|err| LlmError::Http(err.to_string()))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|err| LlmError::Http(err.to_string()))?;
    if !status.is_success() {
        warn!(
            target = "marketdesk::llm",
            provider,
            status = status.as_u16(),
            "llm provider returned non-success status"
        );
        return Err(LlmError::Upstream {
            status: status.as_u16(),
            body: text,
        });
    }

    serde_json::from_str(&text).map_err(|err| LlmError::Http(format!("invalid response: {err}")))
}

fn non_empty(text: Option<String>) -> Result<String, LlmError> {
    text.filter(|text| !text.trim().is_empty())
        .ok_or(LlmError::EmptyCompletion)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    response_mime_type: &'static str,
}

impl<'a> GeminiRequest<'a> {
    fn from_prompt(prompt: &'a LlmPrompt) -> Self {
        Self {
            contents: vec![GeminiContent {
                role: Some("user"),
                parts: vec![GeminiPart {
                    text: &prompt.prompt,
                }],
            }],
            system_instruction: prompt.system.as_deref().map(|text| GeminiContent {
                role: None,
                parts: vec![GeminiPart { text }],
            }),
            generation_config: prompt.json_output.then_some(GeminiGenerationConfig {
                response_mime_type: "application/json",
            }),
        }
    }
}

/// Concatenated text of the first candidate.
fn gemini_text(response: &Value) -> Option<String> {
    let parts = response
        .pointer("/candidates/0/content/parts")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    Some(text)
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    config: ProviderConfig,
}

impl GeminiClient {
    pub fn new(config: ProviderConfig) -> Result<Self, LlmError> {
        Ok(Self {
            http: http_client(config.timeout)?,
            config,
        })
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    fn provider(&self) -> &'static str {
        "gemini"
    }

    async fn complete(&self, prompt: &LlmPrompt) -> Result<String, LlmError> {
        let url = endpoint(
            &self.config.base_url,
            &format!("v1beta/models/{}:generateContent", self.config.model),
        )?;
        let request = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.config.api_key);
        let response = post_json(
            self.provider(),
            request,
            &GeminiRequest::from_prompt(prompt),
        )
        .await?;

        debug!(
            target = "marketdesk::llm",
            provider = self.provider(),
            model = %self.config.model,
            "completion received"
        );
        non_empty(gemini_text(&response))
    }
}

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<OpenAiResponseFormat>,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct OpenAiResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

impl<'a> OpenAiRequest<'a> {
    fn from_prompt(model: &'a str, prompt: &'a LlmPrompt) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = prompt.system.as_deref() {
            messages.push(OpenAiMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(OpenAiMessage {
            role: "user",
            content: &prompt.prompt,
        });
        Self {
            model,
            messages,
            response_format: prompt.json_output.then_some(OpenAiResponseFormat {
                kind: "json_object",
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

fn openai_text(response: Value) -> Option<String> {
    let response: OpenAiResponse = serde_json::from_value(response).ok()?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
}

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: Client,
    config: ProviderConfig,
}

impl OpenAiClient {
    pub fn new(config: ProviderConfig) -> Result<Self, LlmError> {
        Ok(Self {
            http: http_client(config.timeout)?,
            config,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn provider(&self) -> &'static str {
        "openai"
    }

    async fn complete(&self, prompt: &LlmPrompt) -> Result<String, LlmError> {
        let url = endpoint(&self.config.base_url, "v1/chat/completions")?;
        let request = self.http.post(url).bearer_auth(&self.config.api_key);
        let response = post_json(
            self.provider(),
            request,
            &OpenAiRequest::from_prompt(&self.config.model, prompt),
        )
        .await?;

        debug!(
            target = "marketdesk::llm",
            provider = self.provider(),
            model = %self.config.model,
            "completion received"
        );
        non_empty(openai_text(response))
    }
}
