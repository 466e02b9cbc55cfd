//! Polling, unregistration and health endpoints.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use lumen_core::{Job, JobId, JobPayload};
use lumen_jobs::StatusReport;

use crate::{ApiError, AppState};

/// Body of every per-job endpoint.
#[derive(Debug, Deserialize)]
pub struct JobRef {
    pub uuid: String,
}

impl JobRef {
    /// A malformed identifier cannot name a registered job.
    fn job_id(&self) -> Result<JobId, ApiError> {
        self.uuid.parse().map_err(|_| ApiError::JobNotFound)
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub queue_size: usize,
    pub queue_capacity: usize,
    pub jobs: usize,
    pub workers: usize,
}

/// Render the kind-specific completion body for a job snapshot.
pub fn completion_body(job: &Job) -> JsonValue {
    let mut body = match &job.payload {
        JobPayload::Chat(chat) => json!({
            "completion": chat.accumulated_text,
            "history": chat.history,
        }),
        JobPayload::Embed(embed) => json!({ "embedding": embed.embedding }),
        JobPayload::VectorUpload(upload) => json!({ "result": upload.result }),
        JobPayload::VectorQuery(query) => json!({ "result": query.result }),
    };

    body["status"] = json!(job.status);
    body["kind"] = json!(job.kind());
    body["updated_at"] = json!(job.updated_at);
    if let Some(diagnostic) = &job.diagnostic {
        body["diagnostic"] = json!(diagnostic);
    }
    body
}

pub async fn get_status(
    State(state): State<AppState>,
    Json(body): Json<JobRef>,
) -> Result<Json<StatusReport>, ApiError> {
    let id = body.job_id()?;
    state
        .service
        .status(&id)
        .map(Json)
        .ok_or(ApiError::JobNotFound)
}

pub async fn get_completion(
    State(state): State<AppState>,
    Json(body): Json<JobRef>,
) -> Result<Json<JsonValue>, ApiError> {
    let id = body.job_id()?;
    let job = state.service.completion(&id).ok_or(ApiError::JobNotFound)?;
    Ok(Json(completion_body(&job)))
}

/// Idempotent: unknown and malformed identifiers also answer "OK".
pub async fn unregister_job(
    State(state): State<AppState>,
    Json(body): Json<JobRef>,
) -> Json<&'static str> {
    if let Ok(id) = body.uuid.parse::<JobId>() {
        state.service.unregister(&id);
    }
    Json("OK")
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let engine = state.service.health();
    Json(HealthResponse {
        status: "ok",
        queue_size: engine.queue_size,
        queue_capacity: engine.queue_capacity,
        jobs: engine.jobs,
        workers: state.workers,
    })
}
