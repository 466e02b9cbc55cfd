//! Job data model: identifiers, status life-cycle, and kind-specific payloads.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Free-form metadata attached to uploaded documents and returned with hits.
pub type Metadata = serde_json::Map<String, JsonValue>;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Opaque job identifier: a random 128-bit token rendered as 32 hex characters.
///
/// Identifiers are drawn from UUIDv4 so they are never reused within a process,
/// including after the job they named has been unregistered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(Uuid);

impl JobId {
    /// Generate a fresh identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for JobId {
    type Err = Error;

    /// Accepts both the simple (32 hex) and the hyphenated rendering.
    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| Error::InvalidInput(format!("invalid job id '{}': {}", s, e)))
    }
}

impl Serialize for JobId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for JobId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// STATUS & KIND
// =============================================================================

/// Job status. Moves only forward: created → processing → finished | failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Created,
    Processing,
    Finished,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Created => "created",
            JobStatus::Processing => "processing",
            JobStatus::Finished => "finished",
            JobStatus::Failed => "failed",
        }
    }

    /// Finished and failed jobs never change status again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Failed)
    }

    /// Whether `self → next` is an edge of the life-cycle.
    ///
    /// `created → failed` exists for submissions rejected by a full queue,
    /// which never reach `processing`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Created, JobStatus::Processing)
                | (JobStatus::Created, JobStatus::Failed)
                | (JobStatus::Processing, JobStatus::Finished)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job kind, one per payload variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Chat,
    Embed,
    VectorUpload,
    VectorQuery,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Chat => "chat",
            JobKind::Embed => "embed",
            JobKind::VectorUpload => "vector_upload",
            JobKind::VectorQuery => "vector_query",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// CHAT
// =============================================================================

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    /// Role of the history entry at `index`: user first, then strict alternation.
    pub fn for_history_index(index: usize) -> Self {
        if index % 2 == 0 {
            ChatRole::User
        } else {
            ChatRole::Assistant
        }
    }
}

/// A single message sent to a chat provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Chat completion job state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatJob {
    pub system_prompt: String,
    /// Alternating user/assistant turns, user first.
    pub history: Vec<String>,
    /// Streamed output of the turn in progress, or of the last completed turn.
    pub accumulated_text: String,
}

impl ChatJob {
    pub fn new(system_prompt: impl Into<String>, history: Vec<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            history,
            accumulated_text: String::new(),
        }
    }

    /// Provider message list: the system prompt followed by the history with
    /// roles assigned by position.
    pub fn messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.history.len() + 1);
        messages.push(ChatMessage::new(ChatRole::System, self.system_prompt.clone()));
        messages.extend(
            self.history
                .iter()
                .enumerate()
                .map(|(i, turn)| ChatMessage::new(ChatRole::for_history_index(i), turn.clone())),
        );
        messages
    }

    /// Append a streamed delta to the turn in progress.
    pub fn append_chunk(&mut self, delta: &str) {
        self.accumulated_text.push_str(delta);
    }

    /// Commit the turn in progress to the history.
    ///
    /// The committed text stays readable in `accumulated_text` as the job's
    /// completion; the history is the only thing that grows.
    pub fn append_message(&mut self) {
        self.history.push(self.accumulated_text.clone());
    }
}

// =============================================================================
// EMBED
// =============================================================================

/// Text embedding job state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbedJob {
    pub input_text: String,
    /// Absent until finished, and absent after a provider failure.
    pub embedding: Option<Vec<f32>>,
}

// =============================================================================
// VECTOR STORE
// =============================================================================

/// Outcome of a document upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    pub inserted_count: usize,
    /// Documents skipped because text extraction failed or produced nothing.
    pub skipped: usize,
}

/// Document upload job state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VectorUploadJob {
    pub collection_name: String,
    /// Raw document bytes; shared so registry snapshots stay cheap.
    #[serde(skip)]
    pub documents: Arc<Vec<Vec<u8>>>,
    /// Attached to every document extracted from this upload.
    pub metadata: Metadata,
    pub result: Option<UploadResult>,
}

/// A single ranked similarity hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryHit {
    pub score: f32,
    pub metadata: Metadata,
}

/// Similarity query job state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VectorQueryJob {
    pub collection_name: String,
    pub query_text: String,
    /// Hits ordered by descending score.
    pub result: Option<Vec<QueryHit>>,
}

// =============================================================================
// JOB
// =============================================================================

/// Kind-specific job payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobPayload {
    Chat(ChatJob),
    Embed(EmbedJob),
    VectorUpload(VectorUploadJob),
    VectorQuery(VectorQueryJob),
}

impl JobPayload {
    pub fn kind(&self) -> JobKind {
        match self {
            JobPayload::Chat(_) => JobKind::Chat,
            JobPayload::Embed(_) => JobKind::Embed,
            JobPayload::VectorUpload(_) => JobKind::VectorUpload,
            JobPayload::VectorQuery(_) => JobKind::VectorQuery,
        }
    }
}

/// A unit of asynchronous work.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    pub payload: JobPayload,
    /// Underlying provider failure for degraded or failed jobs.
    pub diagnostic: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Advances on every write; a liveness hint for pollers.
    pub updated_at: DateTime<Utc>,
    /// Set when the job reaches a terminal status.
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a job in `created` status with a fresh identifier.
    pub fn new(payload: JobPayload) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            status: JobStatus::Created,
            payload,
            diagnostic: None,
            created_at: now,
            updated_at: now,
            finished_at: None,
        }
    }

    pub fn chat(system_prompt: impl Into<String>, history: Vec<String>) -> Self {
        Self::new(JobPayload::Chat(ChatJob::new(system_prompt, history)))
    }

    pub fn embed(input_text: impl Into<String>) -> Self {
        Self::new(JobPayload::Embed(EmbedJob {
            input_text: input_text.into(),
            embedding: None,
        }))
    }

    pub fn vector_upload(
        collection_name: impl Into<String>,
        documents: Vec<Vec<u8>>,
        metadata: Metadata,
    ) -> Self {
        Self::new(JobPayload::VectorUpload(VectorUploadJob {
            collection_name: collection_name.into(),
            documents: Arc::new(documents),
            metadata,
            result: None,
        }))
    }

    pub fn vector_query(collection_name: impl Into<String>, query_text: impl Into<String>) -> Self {
        Self::new(JobPayload::VectorQuery(VectorQueryJob {
            collection_name: collection_name.into(),
            query_text: query_text.into(),
            result: None,
        }))
    }

    pub fn kind(&self) -> JobKind {
        self.payload.kind()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move to `next`, rejecting edges outside the life-cycle.
    pub fn transition(&mut self, next: JobStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            debug!(
                job_id = %self.id,
                job_kind = %self.kind(),
                from = ?self.status,
                to = ?next,
                "Rejected job status transition"
            );
            return Err(Error::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.touch();
        if next.is_terminal() {
            self.finished_at = Some(self.updated_at);
        }
        Ok(())
    }

    /// Mark the job failed and record why.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<()> {
        self.transition(JobStatus::Failed)?;
        self.diagnostic = Some(reason.into());
        Ok(())
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Terminal jobs that finished strictly before `cutoff`.
    pub fn finished_before(&self, cutoff: DateTime<Utc>) -> bool {
        self.is_terminal() && self.finished_at.is_some_and(|at| at < cutoff)
    }
}
