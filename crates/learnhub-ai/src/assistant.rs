use crate::http::{decode_error, ensure_success, send_error};
use learnhub_core::{
    AssistantAnnotation, AssistantResponsePayload, ChatMessage, LearnHubError, Result, Role,
    Settings,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

/// Assistants protocol revision selected via the beta header.
const ASSISTANTS_BETA: &str = "assistants=v2";

/// Run statuses that end polling without a result.
const TERMINAL_STATUSES: [&str; 3] = ["failed", "expired", "cancelled"];

/// Configuration for the assistant run orchestrator.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub api_key: String,
    pub base_url: String,
    pub assistant_id: String,
    /// Bound to the run's file search tool when present
    pub vector_store_id: Option<String>,
    pub poll_interval: Duration,
    /// Ceiling measured from run creation
    pub run_timeout: Duration,
    pub request_timeout: Duration,
}

impl AssistantConfig {
    /// Build from settings; `None` when no assistant is configured, which
    /// sends chat traffic down the plain completions path instead.
    pub fn from_settings(settings: &Settings) -> Option<Self> {
        let assistant_id = settings.assistant_id.clone()?;
        Some(Self {
            api_key: settings.api_key.clone(),
            base_url: settings.base_url.clone(),
            assistant_id,
            vector_store_id: settings.vector_store_id.clone(),
            poll_interval: settings.poll_interval(),
            run_timeout: settings.run_timeout(),
            request_timeout: settings.request_timeout(),
        })
    }
}

/// Drives the thread → messages → run → poll → fetch protocol.
///
/// Every upstream failure at any step is fatal to the whole call; there is
/// no partial retry. The caller maps errors to its own boundary.
#[derive(Clone)]
pub struct AssistantClient {
    config: AssistantConfig,
    client: Client,
}

impl AssistantClient {
    pub fn new(config: AssistantConfig) -> Result<Self> {
        if config.assistant_id.is_empty() {
            return Err(LearnHubError::Configuration(
                "Missing assistant id. Set OPENAI_ASSISTANT_ID in the server environment."
                    .to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| {
                LearnHubError::Configuration(format!("failed to build HTTP client: {err}"))
            })?;
        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(self.url(path))
            .bearer_auth(&self.config.api_key)
            .header("OpenAI-Beta", ASSISTANTS_BETA)
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(self.url(path))
            .bearer_auth(&self.config.api_key)
            .header("OpenAI-Beta", ASSISTANTS_BETA)
    }

    /// Run the full assistant exchange for one message sequence.
    #[instrument(skip(self, messages), fields(assistant_id = %self.config.assistant_id))]
    pub async fn create_response(
        &self,
        messages: &[ChatMessage],
    ) -> Result<AssistantResponsePayload> {
        let thread_id = self.create_thread().await?;
        debug!(thread_id, "created assistant thread");

        // The thread protocol does not accept a system role; system content
        // becomes a run-level instructions override instead.
        let instructions = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        for message in messages
            .iter()
            .filter(|m| matches!(m.role, Role::User | Role::Assistant))
        {
            self.add_message(&thread_id, message).await?;
        }

        let run_id = self.create_run(&thread_id, &instructions).await?;
        debug!(thread_id, run_id, "created assistant run");

        self.wait_for_completion(&thread_id, &run_id).await?;
        self.latest_assistant_message(&thread_id).await
    }

    async fn create_thread(&self) -> Result<String> {
        let response = self
            .post("/threads")
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|err| send_error("create thread", err))?;
        let response = ensure_success("create thread", response).await?;
        let thread: ObjectResource = response
            .json()
            .await
            .map_err(|err| decode_error("create thread", err))?;
        Ok(thread.id)
    }

    async fn add_message(&self, thread_id: &str, message: &ChatMessage) -> Result<()> {
        let request = ThreadMessageRequest {
            role: message.role,
            content: vec![TextPart {
                kind: "text",
                text: &message.content,
            }],
        };
        let response = self
            .post(&format!("/threads/{thread_id}/messages"))
            .json(&request)
            .send()
            .await
            .map_err(|err| send_error("add message", err))?;
        ensure_success("add message", response).await?;
        Ok(())
    }

    async fn create_run(&self, thread_id: &str, instructions: &str) -> Result<String> {
        let request = CreateRunRequest {
            assistant_id: &self.config.assistant_id,
            instructions: (!instructions.is_empty()).then_some(instructions),
            tool_resources: self.config.vector_store_id.as_deref().map(|store_id| {
                ToolResources {
                    file_search: FileSearchResources {
                        vector_store_ids: vec![store_id],
                    },
                }
            }),
        };
        let response = self
            .post(&format!("/threads/{thread_id}/runs"))
            .json(&request)
            .send()
            .await
            .map_err(|err| send_error("create run", err))?;
        let response = ensure_success("create run", response).await?;
        let run: RunResource = response
            .json()
            .await
            .map_err(|err| decode_error("create run", err))?;
        Ok(run.id)
    }

    async fn wait_for_completion(&self, thread_id: &str, run_id: &str) -> Result<()> {
        let deadline = Instant::now() + self.config.run_timeout;
        loop {
            let response = self
                .get(&format!("/threads/{thread_id}/runs/{run_id}"))
                .send()
                .await
                .map_err(|err| send_error("get run", err))?;
            let response = ensure_success("get run", response).await?;
            let run: RunResource = response
                .json()
                .await
                .map_err(|err| decode_error("get run", err))?;

            if run.status == "completed" {
                return Ok(());
            }
            if TERMINAL_STATUSES.contains(&run.status.as_str()) {
                return Err(LearnHubError::TerminalRun(run.status));
            }
            if Instant::now() >= deadline {
                return Err(LearnHubError::Timeout(format!(
                    "assistant run {run_id} still {} after {}ms",
                    run.status,
                    self.config.run_timeout.as_millis()
                )));
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Fetch the newest assistant turn and normalize its citations.
    ///
    /// The listing is most-recent-first; a thread with no assistant turn
    /// yields empty content rather than an error.
    async fn latest_assistant_message(&self, thread_id: &str) -> Result<AssistantResponsePayload> {
        let response = self
            .get(&format!("/threads/{thread_id}/messages?limit=50"))
            .send()
            .await
            .map_err(|err| send_error("list messages", err))?;
        let response = ensure_success("list messages", response).await?;
        let listing: MessageList = response
            .json()
            .await
            .map_err(|err| decode_error("list messages", err))?;

        let Some(message) = listing.data.into_iter().find(|m| m.role == "assistant") else {
            return Ok(AssistantResponsePayload {
                content: String::new(),
                annotations: Vec::new(),
            });
        };

        let mut contents: Vec<String> = Vec::new();
        let mut annotations: Vec<AssistantAnnotation> = Vec::new();
        for part in message.content {
            if part.kind != "text" {
                continue;
            }
            let Some(text) = part.text else { continue };
            contents.push(text.value);
            annotations.extend(text.annotations.into_iter().map(normalize_annotation));
        }

        Ok(AssistantResponsePayload {
            content: contents.join("\n\n"),
            annotations,
        })
    }
}

/// Collapse the upstream's nested and flattened citation shapes into one
/// annotation record.
fn normalize_annotation(raw: RawAnnotation) -> AssistantAnnotation {
    let kind = raw.kind.unwrap_or_else(|| "unknown".to_string());
    let mut annotation = AssistantAnnotation {
        kind: kind.clone(),
        url: None,
        title: None,
        file_id: None,
        start_index: raw.start_index,
        end_index: raw.end_index,
    };
    match kind.as_str() {
        "url_citation" => {
            annotation.url = raw
                .url
                .or_else(|| raw.url_citation.as_ref().and_then(|d| d.url.clone()));
            annotation.title = raw
                .title
                .or_else(|| raw.url_citation.and_then(|d| d.title));
        }
        "file_citation" => {
            annotation.file_id = raw
                .file_citation
                .as_ref()
                .and_then(|d| d.file_id.clone())
                .or(raw.file_id);
            annotation.title = raw
                .title
                .or_else(|| raw.file_citation.and_then(|d| d.title));
        }
        _ => {}
    }
    annotation
}

// Assistants API wire types

#[derive(Deserialize)]
struct ObjectResource {
    id: String,
}

#[derive(Deserialize)]
struct RunResource {
    id: String,
    #[serde(default)]
    status: String,
}

#[derive(Serialize)]
struct ThreadMessageRequest<'a> {
    role: Role,
    content: Vec<TextPart<'a>>,
}

#[derive(Serialize)]
struct TextPart<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
}

#[derive(Serialize)]
struct CreateRunRequest<'a> {
    assistant_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_resources: Option<ToolResources<'a>>,
}

#[derive(Serialize)]
struct ToolResources<'a> {
    file_search: FileSearchResources<'a>,
}

#[derive(Serialize)]
struct FileSearchResources<'a> {
    vector_store_ids: Vec<&'a str>,
}

#[derive(Deserialize)]
struct MessageList {
    #[serde(default)]
    data: Vec<ThreadMessage>,
}

#[derive(Deserialize)]
struct ThreadMessage {
    #[serde(default)]
    role: String,
    #[serde(default)]
    content: Vec<MessagePart>,
}

#[derive(Deserialize)]
struct MessagePart {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: Option<TextValue>,
}

#[derive(Deserialize)]
struct TextValue {
    #[serde(default)]
    value: String,
    #[serde(default)]
    annotations: Vec<RawAnnotation>,
}

#[derive(Deserialize)]
struct RawAnnotation {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    start_index: Option<u32>,
    #[serde(default)]
    end_index: Option<u32>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    file_id: Option<String>,
    #[serde(default)]
    url_citation: Option<UrlCitationDetail>,
    #[serde(default)]
    file_citation: Option<FileCitationDetail>,
}

#[derive(Deserialize)]
struct UrlCitationDetail {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Deserialize)]
struct FileCitationDetail {
    #[serde(default)]
    file_id: Option<String>,
    #[serde(default)]
    title: Option<String>,
}
