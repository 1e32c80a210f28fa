use crate::http::{decode_error, ensure_success, send_error};
use async_stream::try_stream;
use futures::stream::BoxStream;
use futures::StreamExt;
use learnhub_core::{
    ChatCompletionResult, ChatCompletionUsage, ChatMessage, Result, Settings,
};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Temperature the provider assumes when the field is absent; an explicit
/// 1 is never sent.
const PROVIDER_DEFAULT_TEMPERATURE: f32 = 1.0;

/// The stream passthrough pins a fixed temperature, matching the
/// interactive chat surface.
const STREAM_TEMPERATURE: f32 = 0.7;

const TITLE_SYSTEM_PROMPT: &str =
    "You generate short, descriptive chat titles (max 8 words). Avoid punctuation except dashes.";

/// File-search citation glyphs (【12:3†source】) that leak into assistant
/// output and mean nothing to end users.
static SOURCE_GLYPHS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\u{3010}\d+:\d+\u{2020}source\u{3011}").unwrap());

pub fn strip_source_glyphs(text: &str) -> String {
    SOURCE_GLYPHS.replace_all(text, "").into_owned()
}

/// Configuration for the chat completions client.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    /// Environment-level temperature override
    pub temperature: Option<f32>,
    pub request_timeout: Duration,
}

impl ChatConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            api_key: settings.api_key.clone(),
            base_url: settings.base_url.clone(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            request_timeout: settings.request_timeout(),
        }
    }
}

/// Per-call options; unset fields fall back to the client configuration.
#[derive(Debug, Clone, Default)]
pub struct ChatCompletionOptions {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Single-shot wrapper around the chat completions endpoint.
#[derive(Clone)]
pub struct ChatClient {
    config: ChatConfig,
    client: Client,
}

impl ChatClient {
    pub fn new(config: ChatConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| {
                learnhub_core::LearnHubError::Configuration(format!(
                    "failed to build HTTP client: {err}"
                ))
            })?;
        Ok(Self { config, client })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }

    /// The `temperature` field is omitted when the effective value resolves
    /// to the provider default.
    fn effective_temperature(&self, options: &ChatCompletionOptions) -> Option<f32> {
        options
            .temperature
            .or(self.config.temperature)
            .filter(|t| *t != PROVIDER_DEFAULT_TEMPERATURE)
    }

    /// Execute one chat completion call.
    pub async fn create(
        &self,
        messages: &[ChatMessage],
        options: &ChatCompletionOptions,
    ) -> Result<ChatCompletionResult> {
        let model = options.model.as_deref().unwrap_or(&self.config.model);
        let request = ChatCompletionRequest {
            model,
            messages,
            temperature: self.effective_temperature(options),
            max_tokens: options.max_tokens,
            stream: None,
        };

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|err| send_error("chat completion", err))?;
        let response = ensure_success("chat completion", response).await?;

        let payload: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|err| decode_error("chat completion", err))?;

        let content = payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        Ok(ChatCompletionResult {
            content,
            usage: payload.usage,
            model: payload.model,
        })
    }

    /// Stream completion tokens for the interactive chat surface.
    ///
    /// Yields each non-empty delta token; `[DONE]` and malformed keep-alive
    /// lines are skipped rather than surfaced.
    pub async fn stream_tokens(
        &self,
        messages: &[ChatMessage],
    ) -> Result<BoxStream<'static, Result<String>>> {
        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages,
            temperature: Some(STREAM_TEMPERATURE),
            max_tokens: None,
            stream: Some(true),
        };

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|err| send_error("chat stream", err))?;
        let response = ensure_success("chat stream", response).await?;

        let mut body = response.bytes_stream();
        let stream = try_stream! {
            let mut buffer = String::new();
            while let Some(chunk) = body.next().await {
                let chunk = chunk.map_err(|err| send_error("chat stream", err))?;
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(pos) = buffer.find('\n') {
                    let line = buffer[..pos].trim().to_string();
                    buffer.drain(..=pos);

                    let Some(data) = line.strip_prefix("data:") else {
                        continue;
                    };
                    let data = data.trim();
                    if data.is_empty() || data == "[DONE]" {
                        continue;
                    }
                    match serde_json::from_str::<StreamChunk>(data) {
                        Ok(parsed) => {
                            let token = parsed
                                .choices
                                .into_iter()
                                .next()
                                .and_then(|choice| choice.delta.content)
                                .unwrap_or_default();
                            if !token.is_empty() {
                                yield token;
                            }
                        }
                        Err(err) => debug!("skipping malformed stream payload: {err}"),
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }

    /// Generate a short conversation title from the opening exchange.
    pub async fn generate_title(&self, prompt: &str, reply: &str) -> Result<String> {
        let user = format!(
            "User prompt: {prompt}\nAssistant reply: {reply}\n\nReturn only the title."
        );
        let messages = vec![
            ChatMessage::system(TITLE_SYSTEM_PROMPT),
            ChatMessage::user(user),
        ];
        let options = ChatCompletionOptions {
            model: None,
            temperature: Some(0.2),
            max_tokens: Some(20),
        };
        let result = self.create(&messages, &options).await?;
        Ok(result.content.trim().to_string())
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatCompletionChoice>,
    #[serde(default)]
    usage: Option<ChatCompletionUsage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Deserialize)]
struct ChatCompletionChoice {
    message: InboundMessage,
}

#[derive(Deserialize)]
struct InboundMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize, Default)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}
