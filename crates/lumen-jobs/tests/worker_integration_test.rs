//! Integration tests for the job engine.
//!
//! This test suite validates:
//! - Worker-001: Jobs are processed in submission order
//! - Worker-002: Submissions beyond queue capacity fail immediately
//! - Worker-003: Chat provider failures degrade to the fallback text
//! - Worker-004: Embed provider failures finish without a vector
//! - Worker-005: Upload then query ranks the matching document first
//! - Worker-006: Unregister is idempotent and drops in-flight results
//! - Worker-007: Status moves created -> processing -> finished
//! - Worker-008: A stalled provider degrades chat and embed at the job timeout
//!
//! All providers are in-process mocks, so the suite needs no network.

use std::sync::Arc;
use std::time::Duration;

use lumen_core::{Job, JobId, JobPayload, JobStatus, Metadata};
use lumen_inference::mock::{ChatFailure, MockInferenceBackend};
use lumen_jobs::{
    JobExecutor, JobRegistry, JobService, JobWorker, TaskQueue, WorkerConfig, WorkerEvent,
    WorkerHandle,
};
use lumen_vector::InMemoryVectorStore;
use serde_json::json;
use tokio::time::sleep;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

struct Engine {
    service: JobService,
    backend: MockInferenceBackend,
    handle: WorkerHandle,
}

/// Build registry, queue, store and a running worker pool around `backend`.
fn start_engine(backend: MockInferenceBackend, capacity: usize, config: WorkerConfig) -> Engine {
    let registry = JobRegistry::new();
    let queue = TaskQueue::new(capacity);
    let store = Arc::new(InMemoryVectorStore::new());
    let shared = Arc::new(backend.clone());

    let executor = JobExecutor::new(shared.clone(), shared, store.clone())
        .with_chat_error_text(config.chat_error_text.clone())
        .with_result_limit(config.result_limit);
    let handle = JobWorker::new(registry.clone(), queue.clone(), Arc::new(executor), config).start();

    Engine {
        service: JobService::new(registry, queue, store),
        backend,
        handle,
    }
}

/// Wait for a job to reach a specific status.
async fn wait_for_job_status(
    service: &JobService,
    job_id: JobId,
    expected_status: JobStatus,
    timeout_secs: u64,
) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed().as_secs() < timeout_secs {
        if let Some(report) = service.status(&job_id) {
            if report.status == expected_status {
                return true;
            }
        }
        sleep(Duration::from_millis(10)).await;
    }
    false
}

fn completed(service: &JobService, id: JobId) -> Job {
    service.completion(&id).expect("job should be registered")
}

// ============================================================================
// TESTS
// ============================================================================

#[tokio::test]
async fn test_jobs_processed_in_fifo_order() {
    let engine = start_engine(MockInferenceBackend::new(), 16, WorkerConfig::default());

    let ids: Vec<JobId> = ["A", "B", "C"]
        .iter()
        .map(|text| engine.service.submit_embed(*text).uuid)
        .collect();

    for id in &ids {
        assert!(wait_for_job_status(&engine.service, *id, JobStatus::Finished, 5).await);
    }
    assert_eq!(engine.backend.inputs_for("embed"), vec!["A", "B", "C"]);

    engine.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_submission_at_capacity_is_failed() {
    // Slow provider keeps the single worker busy while the queue fills.
    let engine = start_engine(
        MockInferenceBackend::new().with_latency_ms(300),
        2,
        WorkerConfig::default(),
    );

    let first = engine.service.submit_embed("one");
    assert!(wait_for_job_status(&engine.service, first.uuid, JobStatus::Processing, 5).await);

    let queued: Vec<_> = (0..2).map(|i| engine.service.submit_embed(format!("q{}", i))).collect();
    assert!(queued.iter().all(|s| s.status == JobStatus::Created));
    let depth = engine.service.queue().size();

    let rejected = engine.service.submit_embed("overflow");
    assert_eq!(rejected.status, JobStatus::Failed);
    assert_eq!(engine.service.queue().size(), depth);
    assert_eq!(
        engine.service.status(&rejected.uuid).unwrap().status,
        JobStatus::Failed
    );

    // The rejected job is never dequeued.
    for s in &queued {
        assert!(wait_for_job_status(&engine.service, s.uuid, JobStatus::Finished, 5).await);
    }
    assert!(!engine.backend.inputs_for("embed").contains(&"overflow".to_string()));

    engine.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_chat_failure_on_every_delta_yields_fallback() {
    let engine = start_engine(
        MockInferenceBackend::new().with_chat_failure(ChatFailure::EveryDelta),
        16,
        WorkerConfig::default().with_chat_error_text("Model unavailable."),
    );
    let mut events = engine.handle.events();

    let submission = engine
        .service
        .submit_chat("You are helpful.", vec!["Hello?".to_string()]);
    assert!(wait_for_job_status(&engine.service, submission.uuid, JobStatus::Finished, 5).await);

    let job = completed(&engine.service, submission.uuid);
    match job.payload {
        JobPayload::Chat(chat) => {
            assert_eq!(chat.accumulated_text, "Model unavailable.");
            assert_eq!(chat.history, vec!["Hello?", "Model unavailable."]);
        }
        other => panic!("unexpected payload: {:?}", other),
    }
    assert!(job.diagnostic.is_some());

    let mut degraded = false;
    while let Ok(Ok(event)) = tokio::time::timeout(Duration::from_secs(1), events.recv()).await {
        if let WorkerEvent::JobDegraded { job_id, .. } = event {
            degraded = job_id == submission.uuid;
            break;
        }
    }
    assert!(degraded);

    engine.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_chat_streams_and_commits_turn() {
    let engine = start_engine(
        MockInferenceBackend::new().with_chat_deltas(["The ", "answer ", "is 42."]),
        16,
        WorkerConfig::default(),
    );

    let submission = engine.service.submit_chat(
        "sys",
        vec!["q1".into(), "a1".into(), "q2".into()],
    );
    assert!(wait_for_job_status(&engine.service, submission.uuid, JobStatus::Finished, 5).await);

    let job = completed(&engine.service, submission.uuid);
    assert!(job.diagnostic.is_none());
    assert!(job.finished_at.is_some());
    match job.payload {
        JobPayload::Chat(chat) => {
            assert_eq!(chat.accumulated_text, "The answer is 42.");
            assert_eq!(chat.history.len(), 4);
            assert_eq!(chat.history[3], "The answer is 42.");
        }
        other => panic!("unexpected payload: {:?}", other),
    }
    assert_eq!(engine.backend.inputs_for("chat"), vec!["q2"]);

    engine.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_embed_failure_finishes_without_vector() {
    let engine = start_engine(
        MockInferenceBackend::new().with_embed_failure(true),
        16,
        WorkerConfig::default(),
    );

    let submission = engine.service.submit_embed("unlucky");
    assert!(wait_for_job_status(&engine.service, submission.uuid, JobStatus::Finished, 5).await);

    let job = completed(&engine.service, submission.uuid);
    match job.payload {
        JobPayload::Embed(embed) => assert!(embed.embedding.is_none()),
        other => panic!("unexpected payload: {:?}", other),
    }
    assert!(job.diagnostic.unwrap().contains("Simulated"));

    engine.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_embed_success_stores_vector() {
    let engine = start_engine(
        MockInferenceBackend::new().with_dimension(32),
        16,
        WorkerConfig::default(),
    );

    let submission = engine.service.submit_embed("vectorize me");
    assert!(wait_for_job_status(&engine.service, submission.uuid, JobStatus::Finished, 5).await);

    match completed(&engine.service, submission.uuid).payload {
        JobPayload::Embed(embed) => assert_eq!(embed.embedding.unwrap().len(), 32),
        other => panic!("unexpected payload: {:?}", other),
    }

    engine.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_upload_then_query_ranks_matching_document_first() {
    let engine = start_engine(MockInferenceBackend::new(), 16, WorkerConfig::default());

    let documents: Vec<Vec<u8>> = vec![
        b"Quarterly revenue grew in the northern region.".to_vec(),
        b"The office kitchen will be closed on Friday.".to_vec(),
        b"Axolotl salamanders regenerate lost limbs remarkably.".to_vec(),
        b"Our hiring plan focuses on backend engineers.".to_vec(),
        b"<html><body><p>Parking permits renew every January.</p></body></html>".to_vec(),
    ];
    let mut metadata = Metadata::new();
    metadata.insert("source".into(), json!("wiki"));

    let upload = engine
        .service
        .submit_upload("handbook", documents, metadata)
        .await
        .unwrap();
    assert!(wait_for_job_status(&engine.service, upload.uuid, JobStatus::Finished, 5).await);

    match completed(&engine.service, upload.uuid).payload {
        JobPayload::VectorUpload(upload) => {
            let result = upload.result.unwrap();
            assert_eq!(result.inserted_count, 5);
            assert_eq!(result.skipped, 0);
            assert!(upload.documents.is_empty());
        }
        other => panic!("unexpected payload: {:?}", other),
    }

    let query = engine
        .service
        .submit_query("handbook", "axolotl regenerate limbs")
        .await
        .unwrap();
    assert!(wait_for_job_status(&engine.service, query.uuid, JobStatus::Finished, 5).await);

    match completed(&engine.service, query.uuid).payload {
        JobPayload::VectorQuery(query) => {
            let hits = query.result.unwrap();
            assert_eq!(hits.len(), 5);
            assert!(hits[0].metadata["content"]
                .as_str()
                .unwrap()
                .contains("Axolotl"));
            assert_eq!(hits[0].metadata["source"], "wiki");
            assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
        }
        other => panic!("unexpected payload: {:?}", other),
    }

    // A second upload into the now-existing collection is refused.
    assert!(engine
        .service
        .submit_upload("handbook", vec![b"more".to_vec()], Metadata::new())
        .await
        .is_err());

    engine.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_result_limit_caps_hits() {
    let engine = start_engine(
        MockInferenceBackend::new(),
        16,
        WorkerConfig::default().with_result_limit(2),
    );

    let docs = (0..6).map(|i| format!("note number {}", i).into_bytes()).collect();
    let upload = engine
        .service
        .submit_upload("notes", docs, Metadata::new())
        .await
        .unwrap();
    assert!(wait_for_job_status(&engine.service, upload.uuid, JobStatus::Finished, 5).await);

    let query = engine.service.submit_query("notes", "note").await.unwrap();
    assert!(wait_for_job_status(&engine.service, query.uuid, JobStatus::Finished, 5).await);
    match completed(&engine.service, query.uuid).payload {
        JobPayload::VectorQuery(query) => assert_eq!(query.result.unwrap().len(), 2),
        other => panic!("unexpected payload: {:?}", other),
    }

    engine.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unregister_is_idempotent_and_drops_results() {
    let engine = start_engine(
        MockInferenceBackend::new().with_latency_ms(200),
        16,
        WorkerConfig::default(),
    );
    let mut events = engine.handle.events();

    let submission = engine.service.submit_embed("short-lived");
    assert!(wait_for_job_status(&engine.service, submission.uuid, JobStatus::Processing, 5).await);

    engine.service.unregister(&submission.uuid);
    engine.service.unregister(&submission.uuid);
    engine.service.unregister(&JobId::new());
    assert!(engine.service.status(&submission.uuid).is_none());

    let mut dropped = false;
    while let Ok(Ok(event)) = tokio::time::timeout(Duration::from_secs(2), events.recv()).await {
        if let WorkerEvent::JobDropped { job_id } = event {
            dropped = job_id == submission.uuid;
            break;
        }
    }
    assert!(dropped);
    assert!(engine.service.status(&submission.uuid).is_none());

    engine.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_status_passes_through_processing() {
    let engine = start_engine(
        MockInferenceBackend::new().with_latency_ms(100),
        16,
        WorkerConfig::default(),
    );
    let mut events = engine.handle.events();

    let submission = engine.service.submit_embed("watch me");
    let mut seen = Vec::new();
    while let Ok(Ok(event)) = tokio::time::timeout(Duration::from_secs(2), events.recv()).await {
        match event {
            WorkerEvent::JobStarted { job_id, .. } if job_id == submission.uuid => {
                seen.push(JobStatus::Processing)
            }
            WorkerEvent::JobCompleted { job_id, .. } if job_id == submission.uuid => {
                seen.push(JobStatus::Finished);
                break;
            }
            _ => {}
        }
    }
    assert_eq!(seen, vec![JobStatus::Processing, JobStatus::Finished]);

    let job = completed(&engine.service, submission.uuid);
    assert!(job.updated_at >= job.created_at);
    assert!(job.finished_at.unwrap() <= job.updated_at);

    engine.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_stalled_provider_degrades_chat_and_embed() {
    let engine = start_engine(
        MockInferenceBackend::new().with_latency_ms(5000),
        16,
        WorkerConfig::default()
            .with_worker_count(2)
            .with_job_timeout(1)
            .with_chat_error_text("Model unavailable."),
    );

    let chat = engine.service.submit_chat("sys", vec!["hello?".into()]);
    let embed = engine.service.submit_embed("stuck");
    assert!(wait_for_job_status(&engine.service, chat.uuid, JobStatus::Finished, 5).await);
    assert!(wait_for_job_status(&engine.service, embed.uuid, JobStatus::Finished, 5).await);

    let job = completed(&engine.service, chat.uuid);
    assert!(job.diagnostic.unwrap().contains("timeout"));
    match job.payload {
        JobPayload::Chat(chat) => {
            assert_eq!(chat.accumulated_text, "Model unavailable.");
            assert_eq!(chat.history.last().unwrap(), "Model unavailable.");
        }
        other => panic!("unexpected payload: {:?}", other),
    }

    match completed(&engine.service, embed.uuid).payload {
        JobPayload::Embed(embed) => assert!(embed.embedding.is_none()),
        other => panic!("unexpected payload: {:?}", other),
    }

    engine.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_worker_pool_drains_queue() {
    let engine = start_engine(
        MockInferenceBackend::new().with_latency_ms(20),
        64,
        WorkerConfig::default().with_worker_count(4),
    );
    assert_eq!(engine.handle.worker_count(), 4);

    let ids: Vec<JobId> = (0..20)
        .map(|i| engine.service.submit_embed(format!("job {}", i)).uuid)
        .collect();
    for id in &ids {
        assert!(wait_for_job_status(&engine.service, *id, JobStatus::Finished, 10).await);
    }
    assert_eq!(engine.service.queue().size(), 0);

    engine.handle.shutdown().await.unwrap();
    engine.handle.join().await;
}
