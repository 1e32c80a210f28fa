use crate::http::{decode_error, ensure_success, send_error};
use chrono::Utc;
use futures::future::join_all;
use learnhub_core::{LearnHubError, Result, Settings};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const ASSISTANTS_BETA: &str = "assistants=v2";
const DEFAULT_LIST_LIMIT: u32 = 25;
const MAX_LIST_LIMIT: u32 = 200;

/// Configuration for the vector-store file manager.
#[derive(Debug, Clone)]
pub struct VectorFileConfig {
    pub api_key: String,
    pub base_url: String,
    pub vector_store_id: Option<String>,
    pub request_timeout: Duration,
}

impl VectorFileConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            api_key: settings.api_key.clone(),
            base_url: settings.base_url.clone(),
            vector_store_id: settings.vector_store_id.clone(),
            request_timeout: settings.request_timeout(),
        }
    }
}

/// Format of an uploaded note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteFormat {
    Md,
    Html,
}

impl NoteFormat {
    pub fn extension(self) -> &'static str {
        match self {
            NoteFormat::Md => ".md",
            NoteFormat::Html => ".html",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            NoteFormat::Md => "text/markdown",
            NoteFormat::Html => "text/html",
        }
    }
}

/// Normalized view of a vector-store file entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorFileRecord {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorFileList {
    pub files: Vec<VectorFileRecord>,
    pub has_more: bool,
    pub last_id: Option<String>,
}

/// Result of removing a file from the vector store.
///
/// `file_deleted` is `None` when the underlying file was left in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovalOutcome {
    pub file_deleted: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadOutcome {
    pub file_id: String,
    pub vector_store_id: Option<String>,
    pub vector_store_file_id: Option<String>,
    pub filename: String,
    pub format: NoteFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMeta {
    pub id: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub bytes: Option<u64>,
}

/// Manages the RAG grounding corpus: listing, inspecting, uploading, and
/// removing files attached to the assistant's vector store.
#[derive(Clone)]
pub struct VectorFileManager {
    config: VectorFileConfig,
    client: Client,
}

impl VectorFileManager {
    pub fn new(config: VectorFileConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| {
                LearnHubError::Configuration(format!("failed to build HTTP client: {err}"))
            })?;
        Ok(Self { config, client })
    }

    pub fn vector_store_id(&self) -> Option<&str> {
        self.config.vector_store_id.as_deref()
    }

    fn require_store(&self) -> Result<&str> {
        self.config.vector_store_id.as_deref().ok_or_else(|| {
            LearnHubError::Configuration(
                "Missing vector store id. Set OPENAI_VECTOR_STORE_ID in the server environment."
                    .to_string(),
            )
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    /// List vector-store files, newest page first, enriched with filenames
    /// from the files API.
    pub async fn list(&self, limit: Option<u32>, after: Option<&str>) -> Result<VectorFileList> {
        let store_id = self.require_store()?;
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);

        let mut query: Vec<(&str, String)> = vec![
            ("limit", limit.to_string()),
            // include[]=file expands the source file object when available
            ("include[]", "file".to_string()),
        ];
        if let Some(after) = after {
            query.push(("after", after.to_string()));
        }

        let response = self
            .client
            .get(self.url(&format!("/vector_stores/{store_id}/files")))
            .query(&query)
            .bearer_auth(&self.config.api_key)
            .header("OpenAI-Beta", ASSISTANTS_BETA)
            .send()
            .await
            .map_err(|err| send_error("list vector files", err))?;
        let response = ensure_success("list vector files", response).await?;
        let listing: RawFileList = response
            .json()
            .await
            .map_err(|err| decode_error("list vector files", err))?;

        let last_id = listing.data.last().map(|raw| raw.id.clone());
        let files = join_all(
            listing
                .data
                .into_iter()
                .map(|raw| self.enrich_record(raw)),
        )
        .await;

        Ok(VectorFileList {
            files,
            has_more: listing.has_more,
            last_id,
        })
    }

    /// Fetch one vector-store file entry.
    pub async fn get(&self, vector_file_id: &str) -> Result<VectorFileRecord> {
        let store_id = self.require_store()?;
        let response = self
            .client
            .get(self.url(&format!(
                "/vector_stores/{store_id}/files/{vector_file_id}"
            )))
            .query(&[("include[]", "file")])
            .bearer_auth(&self.config.api_key)
            .header("OpenAI-Beta", ASSISTANTS_BETA)
            .send()
            .await
            .map_err(|err| send_error("fetch vector file", err))?;
        let response = ensure_success("fetch vector file", response).await?;
        let raw: RawVectorFile = response
            .json()
            .await
            .map_err(|err| decode_error("fetch vector file", err))?;
        Ok(self.enrich_record(raw).await)
    }

    /// Detach a file from the vector store and optionally delete the
    /// underlying file object.
    pub async fn remove(
        &self,
        vector_file_id: &str,
        file_id: Option<&str>,
        delete_file: bool,
    ) -> Result<RemovalOutcome> {
        let store_id = self.require_store()?;
        let response = self
            .client
            .delete(self.url(&format!(
                "/vector_stores/{store_id}/files/{vector_file_id}"
            )))
            .bearer_auth(&self.config.api_key)
            .header("OpenAI-Beta", ASSISTANTS_BETA)
            .send()
            .await
            .map_err(|err| send_error("vector store delete", err))?;
        ensure_success("vector store delete", response).await?;

        let file_deleted = match (delete_file, file_id) {
            (true, Some(file_id)) => {
                let result = self
                    .client
                    .delete(self.url(&format!("/files/{file_id}")))
                    .bearer_auth(&self.config.api_key)
                    .send()
                    .await;
                // detachment already succeeded; a failed file delete is
                // reported, not fatal
                Some(result.map(|r| r.status().is_success()).unwrap_or(false))
            }
            _ => None,
        };

        Ok(RemovalOutcome { file_deleted })
    }

    /// Upload note content to the files API and attach it to the vector
    /// store when one is configured.
    pub async fn upload(
        &self,
        content: &str,
        format: NoteFormat,
        filename: Option<String>,
    ) -> Result<UploadOutcome> {
        if content.is_empty() {
            return Err(LearnHubError::InvalidRequest("Missing content".to_string()));
        }

        let filename = resolve_filename(filename, format);
        let part = Part::bytes(content.as_bytes().to_vec())
            .file_name(filename.clone())
            .mime_str(format.mime())
            .map_err(|err| {
                LearnHubError::InvalidRequest(format!("invalid upload mime type: {err}"))
            })?;
        let form = Form::new().part("file", part).text("purpose", "assistants");

        let response = self
            .client
            .post(self.url("/files"))
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|err| send_error("file upload", err))?;
        let response = ensure_success("file upload", response).await?;
        let uploaded: FileMeta = response
            .json()
            .await
            .map_err(|err| decode_error("file upload", err))?;
        debug!(file_id = %uploaded.id, %filename, "uploaded note to files API");

        let mut vector_store_file_id = None;
        if let Some(store_id) = self.config.vector_store_id.as_deref() {
            let response = self
                .client
                .post(self.url(&format!("/vector_stores/{store_id}/files")))
                .bearer_auth(&self.config.api_key)
                .header("OpenAI-Beta", ASSISTANTS_BETA)
                .json(&serde_json::json!({ "file_id": uploaded.id }))
                .send()
                .await
                .map_err(|err| send_error("vector store attach", err))?;
            let response = ensure_success("vector store attach", response).await?;
            let attached: AttachResponse = response
                .json()
                .await
                .map_err(|err| decode_error("vector store attach", err))?;
            vector_store_file_id = attached.id.or(attached.file_id);
        }

        Ok(UploadOutcome {
            file_id: uploaded.id,
            vector_store_id: self.config.vector_store_id.clone(),
            vector_store_file_id,
            filename,
            format,
        })
    }

    /// Fetch metadata for one file object.
    pub async fn file_meta(&self, file_id: &str) -> Result<FileMeta> {
        let response = self
            .client
            .get(self.url(&format!("/files/{file_id}")))
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|err| send_error("fetch file metadata", err))?;
        let response = ensure_success("fetch file metadata", response).await?;
        response
            .json()
            .await
            .map_err(|err| decode_error("fetch file metadata", err))
    }

    /// Resolve the source file id and backfill filename/created_at from the
    /// files API. Enrichment failures degrade to the listing's own fields.
    async fn enrich_record(&self, raw: RawVectorFile) -> VectorFileRecord {
        let file_id = raw.source_file_id();
        let mut filename = raw
            .file
            .as_ref()
            .and_then(|f| f.filename.clone())
            .or(raw.filename);
        let mut created_at = raw
            .file
            .as_ref()
            .and_then(|f| f.created_at)
            .or(raw.created_at);

        if let Some(file_id) = file_id.as_deref() {
            match self.file_meta(file_id).await {
                Ok(meta) => {
                    filename = meta.filename.or(filename);
                    created_at = meta.created_at.or(created_at);
                }
                Err(err) => {
                    warn!(file_id, "file metadata enrichment failed: {err}");
                }
            }
        }

        VectorFileRecord {
            id: raw.id,
            file_id,
            filename,
            status: raw.status,
            created_at,
        }
    }
}

fn resolve_filename(filename: Option<String>, format: NoteFormat) -> String {
    let ext = format.extension();
    let base = filename.filter(|name| !name.is_empty()).unwrap_or_else(|| {
        let timestamp = Utc::now()
            .format("%Y-%m-%dT%H:%M:%S%.3fZ")
            .to_string()
            .replace([':', '.'], "-");
        format!("note-{timestamp}{ext}")
    });
    if base.ends_with(ext) {
        base
    } else {
        format!("{base}{ext}")
    }
}

// Vector store wire types

#[derive(Deserialize)]
struct RawFileList {
    #[serde(default)]
    data: Vec<RawVectorFile>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Deserialize)]
struct RawVectorFile {
    id: String,
    #[serde(default)]
    file_id: Option<String>,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    created_at: Option<i64>,
    #[serde(default)]
    file: Option<ExpandedFile>,
}

impl RawVectorFile {
    /// Some deployments return a bare `file_…` id as the record id itself.
    fn source_file_id(&self) -> Option<String> {
        self.file
            .as_ref()
            .and_then(|f| f.id.clone())
            .or_else(|| self.file_id.clone())
            .or_else(|| {
                (self.id.starts_with("file_") || self.id.starts_with("file-"))
                    .then(|| self.id.clone())
            })
    }
}

#[derive(Deserialize)]
struct ExpandedFile {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    created_at: Option<i64>,
}

#[derive(Deserialize)]
struct AttachResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    file_id: Option<String>,
}
