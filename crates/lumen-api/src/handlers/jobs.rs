//! Submission endpoints.

use axum::extract::State;
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use tracing::debug;

use lumen_core::Metadata;
use lumen_jobs::Submission;

use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(alias = "sysprompt")]
    pub system_prompt: String,
    /// Alternating user/assistant turns, user first.
    #[serde(alias = "messages", default)]
    pub history: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct EmbedRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct UploadFilesRequest {
    #[serde(alias = "collection")]
    pub collection_name: String,
    /// Base64-encoded document bytes.
    pub files: Vec<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    #[serde(alias = "collection")]
    pub collection_name: String,
    pub query: String,
}

fn require_collection_name(name: &str) -> Result<&str, ApiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("collection_name must not be empty".into()));
    }
    Ok(name)
}

/// Decode every file, rejecting the whole request on the first bad entry.
fn decode_files(files: &[String]) -> Result<Vec<Vec<u8>>, ApiError> {
    files
        .iter()
        .enumerate()
        .map(|(index, encoded)| {
            BASE64
                .decode(encoded.trim())
                .map_err(|e| ApiError::BadRequest(format!("files[{}] is not valid base64: {}", index, e)))
        })
        .collect()
}

pub async fn submit_chat(
    State(state): State<AppState>,
    Json(body): Json<ChatRequest>,
) -> Json<Submission> {
    debug!(history_len = body.history.len(), "Chat submitted");
    Json(state.service.submit_chat(body.system_prompt, body.history))
}

pub async fn submit_embed(
    State(state): State<AppState>,
    Json(body): Json<EmbedRequest>,
) -> Json<Submission> {
    Json(state.service.submit_embed(body.text))
}

pub async fn upload_files(
    State(state): State<AppState>,
    Json(body): Json<UploadFilesRequest>,
) -> Result<Json<Submission>, ApiError> {
    let collection = require_collection_name(&body.collection_name)?;
    let documents = decode_files(&body.files)?;
    let submission = state
        .service
        .submit_upload(collection, documents, body.metadata)
        .await?;
    Ok(Json(submission))
}

pub async fn query_vector_store(
    State(state): State<AppState>,
    Json(body): Json<QueryRequest>,
) -> Result<Json<Submission>, ApiError> {
    let collection = require_collection_name(&body.collection_name)?;
    let submission = state.service.submit_query(collection, &body.query).await?;
    Ok(Json(submission))
}
