//! Job execution: one exhaustive dispatch over job kinds.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value as JsonValue;
use tracing::{debug, info, trace, warn};

use lumen_core::{
    defaults, ChatBackend, ChatJob, EmbedJob, EmbeddingBackend, Job, JobId, JobPayload,
    QueryHit, UploadResult, VectorPoint, VectorQueryJob, VectorStore, VectorUploadJob,
};

use crate::extraction::DocumentExtractor;
use crate::registry::JobRegistry;

/// Context handed to a handler for one job.
pub struct JobContext {
    /// Snapshot of the job taken when processing began.
    pub job: Job,
    registry: JobRegistry,
}

impl JobContext {
    pub fn new(job: Job, registry: JobRegistry) -> Self {
        Self { job, registry }
    }

    pub fn job_id(&self) -> JobId {
        self.job.id
    }

    /// Write to the live job while it is processing. Returns false once the
    /// job has been unregistered.
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut Job),
    {
        self.registry.update(&self.job.id, f)
    }
}

/// Kind-specific output applied together with the terminal status.
#[derive(Debug)]
pub enum JobOutput {
    /// Commit the streamed turn to the history.
    Chat,
    /// Append fallback text to the turn in progress, then commit it.
    ChatFallback(String),
    Embed(Option<Vec<f32>>),
    Upload(UploadResult),
    Query(Vec<QueryHit>),
    /// Nothing to write.
    None,
}

impl JobOutput {
    /// Write the output into the job payload.
    pub fn apply(self, payload: &mut JobPayload) {
        match (self, payload) {
            (JobOutput::Chat, JobPayload::Chat(chat)) => chat.append_message(),
            (JobOutput::ChatFallback(text), JobPayload::Chat(chat)) => {
                chat.append_chunk(&text);
                chat.append_message();
            }
            (JobOutput::Embed(embedding), JobPayload::Embed(embed)) => embed.embedding = embedding,
            (JobOutput::Upload(result), JobPayload::VectorUpload(upload)) => {
                upload.result = Some(result);
                upload.documents = Arc::default();
            }
            (JobOutput::Query(hits), JobPayload::VectorQuery(query)) => query.result = Some(hits),
            (JobOutput::None, JobPayload::VectorUpload(upload)) => {
                upload.documents = Arc::default();
            }
            (JobOutput::None, _) => {}
            (output, payload) => {
                warn!(
                    output = ?output,
                    job_kind = %payload.kind(),
                    "Job output does not match payload kind, discarded"
                );
            }
        }
    }
}

/// Result of job execution.
#[derive(Debug)]
pub enum JobResult {
    /// Job finished normally.
    Success(JobOutput),
    /// Job finished with a fallback result; carries the provider failure.
    Degraded(JobOutput, String),
    /// Job failed with an error message.
    Failed(String),
}

/// Trait for job handlers.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Execute the job.
    async fn execute(&self, ctx: JobContext) -> JobResult;
}

/// The production handler: runs every job kind against the configured
/// providers.
pub struct JobExecutor {
    embedder: Arc<dyn EmbeddingBackend>,
    chat: Arc<dyn ChatBackend>,
    store: Arc<dyn VectorStore>,
    extractor: Arc<DocumentExtractor>,
    chat_error_text: String,
    result_limit: usize,
}

impl JobExecutor {
    pub fn new(
        embedder: Arc<dyn EmbeddingBackend>,
        chat: Arc<dyn ChatBackend>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            embedder,
            chat,
            store,
            extractor: Arc::new(DocumentExtractor::with_default_adapters()),
            chat_error_text: defaults::CHAT_ERROR_TEXT.to_string(),
            result_limit: defaults::RESULT_LIMIT,
        }
    }

    /// Replace the document extractor.
    pub fn with_extractor(mut self, extractor: DocumentExtractor) -> Self {
        self.extractor = Arc::new(extractor);
        self
    }

    /// Text appended to a chat turn when the provider fails.
    pub fn with_chat_error_text(mut self, text: impl Into<String>) -> Self {
        self.chat_error_text = text.into();
        self
    }

    /// Number of hits kept by vector queries.
    pub fn with_result_limit(mut self, limit: usize) -> Self {
        self.result_limit = limit.max(1);
        self
    }

    async fn run_chat(&self, ctx: &JobContext, chat: &ChatJob) -> JobResult {
        let messages = chat.messages();
        let start = Instant::now();
        let mut delta_count = 0usize;

        let failure = match self.chat.chat_stream(&messages).await {
            Ok(mut stream) => {
                let mut failure = None;
                while let Some(item) = stream.next().await {
                    match item {
                        Ok(delta) => {
                            delta_count += 1;
                            trace!(response_len = delta.len(), "Chat delta");
                            let live = ctx.update(|job| {
                                if let JobPayload::Chat(chat) = &mut job.payload {
                                    chat.append_chunk(&delta);
                                }
                            });
                            if !live {
                                debug!(job_id = %ctx.job_id(), "Job unregistered mid-stream, stopping");
                                return JobResult::Failed("job unregistered".to_string());
                            }
                        }
                        Err(e) => {
                            failure = Some(e.to_string());
                            break;
                        }
                    }
                }
                failure
            }
            Err(e) => Some(e.to_string()),
        };

        match failure {
            None => {
                debug!(
                    delta_count,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Chat stream complete"
                );
                JobResult::Success(JobOutput::Chat)
            }
            Some(error) => {
                warn!(
                    job_id = %ctx.job_id(),
                    delta_count,
                    error = %error,
                    "Chat provider failed, appending fallback text"
                );
                let fallback = self.chat_error_text.clone();
                ctx.update(|job| {
                    if let JobPayload::Chat(chat) = &mut job.payload {
                        chat.append_chunk(&fallback);
                    }
                });
                JobResult::Degraded(JobOutput::Chat, error)
            }
        }
    }

    async fn run_embed(&self, ctx: &JobContext, embed: &EmbedJob) -> JobResult {
        match self.embedder.embed(&embed.input_text).await {
            Ok(vector) => JobResult::Success(JobOutput::Embed(Some(vector))),
            Err(e) => {
                warn!(job_id = %ctx.job_id(), error = %e, "Embedding failed, finishing without a vector");
                JobResult::Degraded(JobOutput::Embed(None), e.to_string())
            }
        }
    }

    async fn run_upload(&self, ctx: &JobContext, upload: &VectorUploadJob) -> JobResult {
        let total = upload.documents.len();
        let mut texts = Vec::with_capacity(total);
        let mut skipped = 0usize;

        for (index, document) in upload.documents.iter().enumerate() {
            match self.extractor.extract(document).await {
                Ok(result) if !result.text.trim().is_empty() => texts.push(result.text),
                Ok(_) => {
                    skipped += 1;
                    warn!(job_id = %ctx.job_id(), index, "Document produced no text, skipping");
                }
                Err(e) => {
                    skipped += 1;
                    warn!(job_id = %ctx.job_id(), index, error = %e, "Document extraction failed, skipping");
                }
            }
        }

        if texts.is_empty() {
            info!(job_id = %ctx.job_id(), skipped, "No extractable documents in upload");
            return JobResult::Success(JobOutput::Upload(UploadResult {
                inserted_count: 0,
                skipped,
            }));
        }

        let vectors = match self.embedder.embed_texts(&texts).await {
            Ok(vectors) if vectors.len() == texts.len() => vectors,
            Ok(vectors) => {
                return JobResult::Failed(format!(
                    "embedding backend returned {} vectors for {} documents",
                    vectors.len(),
                    texts.len()
                ))
            }
            Err(e) => return JobResult::Failed(e.to_string()),
        };

        let dimension = vectors.first().map(Vec::len).unwrap_or(0);
        if let Err(e) = self
            .store
            .ensure_collection(&upload.collection_name, dimension)
            .await
        {
            return JobResult::Failed(e.to_string());
        }

        let points: Vec<VectorPoint> = texts
            .into_iter()
            .zip(vectors)
            .map(|(text, vector)| {
                let mut payload = upload.metadata.clone();
                payload.insert(defaults::CONTENT_KEY.to_string(), JsonValue::String(text));
                VectorPoint::new(vector, payload)
            })
            .collect();

        match self.store.upsert(&upload.collection_name, points).await {
            Ok(inserted_count) => {
                info!(
                    job_id = %ctx.job_id(),
                    collection = %upload.collection_name,
                    inserted_count,
                    skipped,
                    "Upload stored"
                );
                JobResult::Success(JobOutput::Upload(UploadResult {
                    inserted_count,
                    skipped,
                }))
            }
            Err(e) => JobResult::Failed(e.to_string()),
        }
    }

    async fn run_query(&self, ctx: &JobContext, query: &VectorQueryJob) -> JobResult {
        let vector = match self.embedder.embed(&query.query_text).await {
            Ok(vector) => vector,
            Err(e) => return JobResult::Failed(e.to_string()),
        };

        match self
            .store
            .query(&query.collection_name, &vector, self.result_limit)
            .await
        {
            Ok(mut hits) => {
                hits.sort_by(|a, b| b.score.total_cmp(&a.score));
                hits.truncate(self.result_limit);
                debug!(job_id = %ctx.job_id(), result_count = hits.len(), "Query complete");
                JobResult::Success(JobOutput::Query(hits))
            }
            Err(e) => JobResult::Failed(e.to_string()),
        }
    }
}

#[async_trait]
impl JobHandler for JobExecutor {
    async fn execute(&self, ctx: JobContext) -> JobResult {
        match &ctx.job.payload {
            JobPayload::Chat(chat) => self.run_chat(&ctx, chat).await,
            JobPayload::Embed(embed) => self.run_embed(&ctx, embed).await,
            JobPayload::VectorUpload(upload) => self.run_upload(&ctx, upload).await,
            JobPayload::VectorQuery(query) => self.run_query(&ctx, query).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::{JobStatus, Metadata};
    use lumen_inference::mock::{ChatFailure, MockInferenceBackend};
    use lumen_vector::InMemoryVectorStore;
    use serde_json::json;

    fn executor(backend: MockInferenceBackend, store: Arc<InMemoryVectorStore>) -> JobExecutor {
        let backend = Arc::new(backend);
        JobExecutor::new(backend.clone(), backend, store)
    }

    fn context(job: Job) -> (JobContext, JobRegistry) {
        let registry = JobRegistry::new();
        let mut job = job;
        job.transition(JobStatus::Processing).unwrap();
        registry.add(job.clone());
        (JobContext::new(job, registry.clone()), registry)
    }

    fn chat_text(registry: &JobRegistry, id: &JobId) -> String {
        match registry.get(id).unwrap().payload {
            JobPayload::Chat(chat) => chat.accumulated_text,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_chat_streams_into_registry() {
        let backend = MockInferenceBackend::new().with_chat_deltas(["Hel", "lo"]);
        let exec = executor(backend.clone(), Arc::new(InMemoryVectorStore::new()));
        let (ctx, registry) = context(Job::chat("be brief", vec!["hi".into()]));
        let id = ctx.job_id();

        let result = exec.execute(ctx).await;
        assert!(matches!(result, JobResult::Success(JobOutput::Chat)));
        assert_eq!(chat_text(&registry, &id), "Hello");
        assert_eq!(backend.inputs_for("chat"), vec!["hi"]);
    }

    #[tokio::test]
    async fn test_chat_fallback_on_open_failure() {
        let backend = MockInferenceBackend::new().with_chat_failure(ChatFailure::OnOpen);
        let exec = executor(backend, Arc::new(InMemoryVectorStore::new()))
            .with_chat_error_text("Sorry.");
        let (ctx, registry) = context(Job::chat("sys", vec!["q".into()]));
        let id = ctx.job_id();

        let result = exec.execute(ctx).await;
        assert!(matches!(result, JobResult::Degraded(JobOutput::Chat, _)));
        assert_eq!(chat_text(&registry, &id), "Sorry.");
    }

    #[tokio::test]
    async fn test_chat_keeps_partial_text_before_fallback() {
        let backend = MockInferenceBackend::new()
            .with_chat_deltas(["part", "ial", "never"])
            .with_chat_failure(ChatFailure::AfterDeltas(2));
        let exec = executor(backend, Arc::new(InMemoryVectorStore::new()));
        let (ctx, registry) = context(Job::chat("sys", vec!["q".into()]));
        let id = ctx.job_id();

        exec.execute(ctx).await;
        assert_eq!(
            chat_text(&registry, &id),
            format!("partial{}", defaults::CHAT_ERROR_TEXT)
        );
    }

    #[tokio::test]
    async fn test_chat_stops_when_unregistered() {
        let backend = MockInferenceBackend::new();
        let exec = executor(backend, Arc::new(InMemoryVectorStore::new()));
        let (ctx, registry) = context(Job::chat("sys", vec![]));
        registry.delete(&ctx.job_id());

        assert!(matches!(exec.execute(ctx).await, JobResult::Failed(_)));
    }

    #[tokio::test]
    async fn test_embed_degrades_without_vector() {
        let backend = MockInferenceBackend::new().with_embed_failure(true);
        let exec = executor(backend, Arc::new(InMemoryVectorStore::new()));
        let (ctx, _) = context(Job::embed("text"));

        match exec.execute(ctx).await {
            JobResult::Degraded(JobOutput::Embed(None), diagnostic) => {
                assert!(diagnostic.contains("Simulated"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_upload_skips_bad_documents_and_attaches_metadata() {
        let store = Arc::new(InMemoryVectorStore::new());
        let exec = executor(MockInferenceBackend::new().with_dimension(64), store.clone());

        let mut metadata = Metadata::new();
        metadata.insert("source".into(), json!("handbook"));
        let (ctx, _) = context(Job::vector_upload(
            "docs",
            vec![
                b"first document".to_vec(),
                b"%PDF-not really".to_vec(),
                b"   ".to_vec(),
                b"second document".to_vec(),
            ],
            metadata,
        ));

        match exec.execute(ctx).await {
            JobResult::Success(JobOutput::Upload(result)) => {
                assert_eq!(result.inserted_count, 2);
                assert_eq!(result.skipped, 2);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(store.point_count("docs").await, Some(2));

        let hits = store
            .query("docs", &lumen_inference::mock::MockEmbeddingGenerator::generate("first document", 64), 1)
            .await
            .unwrap();
        assert_eq!(hits[0].metadata["source"], "handbook");
        assert_eq!(hits[0].metadata[defaults::CONTENT_KEY], "first document");
    }

    #[tokio::test]
    async fn test_upload_embedding_failure_fails_job() {
        let exec = executor(
            MockInferenceBackend::new().with_embed_failure(true),
            Arc::new(InMemoryVectorStore::new()),
        );
        let (ctx, _) = context(Job::vector_upload("docs", vec![b"text".to_vec()], Metadata::new()));
        assert!(matches!(exec.execute(ctx).await, JobResult::Failed(_)));
    }

    #[tokio::test]
    async fn test_query_missing_collection_fails() {
        let exec = executor(MockInferenceBackend::new(), Arc::new(InMemoryVectorStore::new()));
        let (ctx, _) = context(Job::vector_query("ghost", "anything"));
        match exec.execute(ctx).await {
            JobResult::Failed(error) => assert!(error.contains("ghost")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_output_apply_releases_documents() {
        let mut job = Job::vector_upload("docs", vec![vec![1, 2, 3]], Metadata::new());
        JobOutput::Upload(UploadResult {
            inserted_count: 1,
            skipped: 0,
        })
        .apply(&mut job.payload);

        match job.payload {
            JobPayload::VectorUpload(upload) => {
                assert!(upload.documents.is_empty());
                assert_eq!(upload.result.unwrap().inserted_count, 1);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_output_apply_fallback_completes_partial_turn() {
        let mut job = Job::chat("sys", vec!["q".into()]);
        if let JobPayload::Chat(chat) = &mut job.payload {
            chat.append_chunk("half an ");
        }
        JobOutput::ChatFallback("Sorry.".into()).apply(&mut job.payload);
        match job.payload {
            JobPayload::Chat(chat) => {
                assert_eq!(chat.accumulated_text, "half an Sorry.");
                assert_eq!(chat.history, vec!["q", "half an Sorry."]);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_output_apply_ignores_mismatched_kind() {
        let mut job = Job::chat("sys", vec!["q".into()]);
        JobOutput::Embed(Some(vec![1.0, 0.0])).apply(&mut job.payload);
        JobOutput::Query(Vec::new()).apply(&mut job.payload);
        match job.payload {
            JobPayload::Chat(chat) => {
                assert_eq!(chat.history, vec!["q"]);
                assert!(chat.accumulated_text.is_empty());
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_output_apply_commits_chat_turn() {
        let mut job = Job::chat("sys", vec!["q".into()]);
        if let JobPayload::Chat(chat) = &mut job.payload {
            chat.append_chunk("answer");
        }
        JobOutput::Chat.apply(&mut job.payload);
        match job.payload {
            JobPayload::Chat(chat) => assert_eq!(chat.history, vec!["q", "answer"]),
            _ => unreachable!(),
        }
    }
}
