use crate::{ApiError, ApiResult, AppState};
use axum::{
    body::Body,
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use learnhub_ai::{
    refine_assistant_output, strip_source_glyphs, ChatCompletionOptions, FileMeta, NoteFormat,
    VectorFileRecord,
};
use learnhub_core::{
    AssistantAnnotation, ChatCompletionUsage, ChatMessage, Role,
};
use learnhub_rules::rewrite_messages_with_rules;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: option_env!("CARGO_PKG_VERSION")
            .unwrap_or("0.1.0")
            .to_string(),
    })
}

#[derive(Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
pub struct ChatParams {
    #[serde(default)]
    pub stream: Option<String>,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Vec<AssistantAnnotation>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<ChatCompletionUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Chat entrypoint.
///
/// With an assistant configured the request runs the full two-pass
/// pipeline: rules rewrite → assistant run → glyph strip → refinement.
/// Without one it falls back to plain completions, optionally streaming
/// raw tokens when `stream=1`.
pub async fn chat(
    State(state): State<AppState>,
    Query(params): Query<ChatParams>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<Response> {
    let messages = request.messages;

    if let Some(assistant) = &state.assistant {
        let rewrite = rewrite_messages_with_rules(&messages, &state.rules);
        if let Some(normalized) = rewrite.normalized.as_deref() {
            debug!(normalized, "rewrote user turn against rules");
        }

        let payload = assistant.create_response(&rewrite.messages).await?;
        let cleaned = strip_source_glyphs(&payload.content);

        let latest_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let refined = refine_assistant_output(&state.chat, &latest_user, &cleaned).await?;

        return Ok(Json(ChatResponse {
            content: strip_source_glyphs(&refined.content),
            annotations: Some(payload.annotations),
            usage: refined.usage,
            model: refined.model,
        })
        .into_response());
    }

    if params.stream.as_deref() == Some("1") {
        let stream = state.chat.stream_tokens(&messages).await?;
        let response = Response::builder()
            .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .header(header::CACHE_CONTROL, "no-cache, no-transform")
            .body(Body::from_stream(stream))
            .map_err(|err| ApiError::Core(learnhub_core::LearnHubError::Configuration(
                format!("failed to build stream response: {err}"),
            )))?;
        return Ok(response);
    }

    let result = state
        .chat
        .create(&messages, &ChatCompletionOptions::default())
        .await?;
    Ok(Json(ChatResponse {
        content: strip_source_glyphs(&result.content),
        annotations: None,
        usage: result.usage,
        model: result.model,
    })
    .into_response())
}

#[derive(Deserialize)]
pub struct TitleRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub reply: String,
}

#[derive(Serialize)]
pub struct TitleResponse {
    pub title: String,
}

/// Generate a short conversation title, degrading to a prompt prefix when
/// the upstream call fails or returns nothing.
pub async fn title(
    State(state): State<AppState>,
    Json(request): Json<TitleRequest>,
) -> Json<TitleResponse> {
    let fallback = || {
        let prefix: String = request.prompt.chars().take(48).collect();
        if prefix.is_empty() {
            "Untitled".to_string()
        } else {
            prefix
        }
    };

    let title = match state.chat.generate_title(&request.prompt, &request.reply).await {
        Ok(title) if !title.is_empty() => title,
        Ok(_) => fallback(),
        Err(err) => {
            warn!("title generation failed, using fallback: {err}");
            fallback()
        }
    };

    Json(TitleResponse { title })
}

#[derive(Deserialize)]
pub struct VectorFilesParams {
    pub vf: Option<String>,
    pub limit: Option<u32>,
    pub after: Option<String>,
}

#[derive(Serialize)]
pub struct VectorFilesWarning {
    pub files: Vec<VectorFileRecord>,
    pub warning: String,
}

#[derive(Serialize)]
pub struct SingleVectorFile {
    pub vector_file: VectorFileRecord,
}

pub async fn vector_files(
    State(state): State<AppState>,
    Query(params): Query<VectorFilesParams>,
) -> ApiResult<Response> {
    if state.files.vector_store_id().is_none() {
        return Ok(Json(VectorFilesWarning {
            files: Vec::new(),
            warning: "OPENAI_VECTOR_STORE_ID not set".to_string(),
        })
        .into_response());
    }

    if let Some(vector_file_id) = params.vf.as_deref() {
        let record = state.files.get(vector_file_id).await?;
        return Ok(Json(SingleVectorFile {
            vector_file: record,
        })
        .into_response());
    }

    let listing = state
        .files
        .list(params.limit, params.after.as_deref())
        .await?;
    Ok(Json(listing).into_response())
}

#[derive(Deserialize)]
pub struct RemoveVectorFileRequest {
    pub vector_file_id: Option<String>,
    pub file_id: Option<String>,
    #[serde(default)]
    pub delete_file: bool,
}

#[derive(Serialize)]
pub struct RemoveVectorFileResponse {
    pub ok: bool,
    pub file_deleted: Option<bool>,
}

pub async fn remove_vector_file(
    State(state): State<AppState>,
    Json(request): Json<RemoveVectorFileRequest>,
) -> ApiResult<Json<RemoveVectorFileResponse>> {
    if state.files.vector_store_id().is_none() {
        return Err(ApiError::BadRequest(
            "OPENAI_VECTOR_STORE_ID not set".to_string(),
        ));
    }
    let Some(vector_file_id) = request.vector_file_id.as_deref() else {
        return Err(ApiError::BadRequest("Missing vector_file_id".to_string()));
    };

    let outcome = state
        .files
        .remove(
            vector_file_id,
            request.file_id.as_deref(),
            request.delete_file,
        )
        .await?;

    Ok(Json(RemoveVectorFileResponse {
        ok: true,
        file_deleted: outcome.file_deleted,
    }))
}

#[derive(Deserialize)]
pub struct FileMetaParams {
    pub id: Option<String>,
}

pub async fn file_meta(
    State(state): State<AppState>,
    Query(params): Query<FileMetaParams>,
) -> ApiResult<Json<FileMeta>> {
    let Some(id) = params.id.as_deref() else {
        return Err(ApiError::BadRequest("Missing id".to_string()));
    };
    let meta = state.files.file_meta(id).await?;
    Ok(Json(meta))
}

#[derive(Deserialize)]
pub struct UploadRequest {
    #[serde(default)]
    pub content: String,
    pub format: Option<NoteFormat>,
    pub filename: Option<String>,
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub ok: bool,
    pub file_id: String,
    pub vector_store_id: Option<String>,
    pub vector_store_file_id: Option<String>,
    pub filename: String,
    pub format: NoteFormat,
}

pub async fn upload(
    State(state): State<AppState>,
    Json(request): Json<UploadRequest>,
) -> ApiResult<Json<UploadResponse>> {
    let format = request.format.unwrap_or(NoteFormat::Md);
    let outcome = state
        .files
        .upload(&request.content, format, request.filename)
        .await?;

    Ok(Json(UploadResponse {
        ok: true,
        file_id: outcome.file_id,
        vector_store_id: outcome.vector_store_id,
        vector_store_file_id: outcome.vector_store_file_id,
        filename: outcome.filename,
        format: outcome.format,
    }))
}
