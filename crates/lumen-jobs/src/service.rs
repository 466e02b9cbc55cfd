//! Submit, poll and unregister: the job operations behind the API.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use lumen_core::{Error, Job, JobId, JobKind, JobStatus, Metadata, Result, VectorStore};

use crate::queue::TaskQueue;
use crate::registry::JobRegistry;

/// Identifier and initial status of a submitted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Submission {
    pub uuid: JobId,
    pub status: JobStatus,
}

/// Status poll answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub status: JobStatus,
    /// Advisory queue depth at the time of the poll.
    pub queue_size: usize,
}

/// Point-in-time engine summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineHealth {
    pub queue_size: usize,
    pub queue_capacity: usize,
    pub jobs: usize,
}

/// Front door to the job engine.
#[derive(Clone)]
pub struct JobService {
    registry: JobRegistry,
    queue: TaskQueue,
    store: Arc<dyn VectorStore>,
}

impl JobService {
    pub fn new(registry: JobRegistry, queue: TaskQueue, store: Arc<dyn VectorStore>) -> Self {
        Self {
            registry,
            queue,
            store,
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    /// Register and enqueue a job.
    ///
    /// A full queue does not fail the call: the job is marked failed
    /// immediately and stays pollable under its identifier.
    pub fn submit(&self, job: Job) -> Submission {
        let uuid = job.id;
        let kind = job.kind();
        self.registry.add(job);

        match self.queue.enqueue(uuid) {
            Ok(()) => {
                debug!(job_id = %uuid, job_kind = %kind, queue_size = self.queue.size(), "Job queued");
                Submission {
                    uuid,
                    status: JobStatus::Created,
                }
            }
            Err(e) => {
                warn!(job_id = %uuid, job_kind = %kind, error = %e, "Job rejected");
                let reason = e.to_string();
                self.registry.update(&uuid, |job| {
                    let _ = job.fail(reason);
                });
                Submission {
                    uuid,
                    status: JobStatus::Failed,
                }
            }
        }
    }

    pub fn submit_chat(&self, system_prompt: impl Into<String>, history: Vec<String>) -> Submission {
        self.submit(Job::chat(system_prompt, history))
    }

    pub fn submit_embed(&self, text: impl Into<String>) -> Submission {
        self.submit(Job::embed(text))
    }

    /// Submit documents for a new collection. Fails with
    /// [`Error::CollectionExists`] if the collection is already there.
    pub async fn submit_upload(
        &self,
        collection_name: &str,
        documents: Vec<Vec<u8>>,
        metadata: Metadata,
    ) -> Result<Submission> {
        if self.store.collection_exists(collection_name).await? {
            return Err(Error::CollectionExists(collection_name.to_string()));
        }
        info!(collection = collection_name, documents = documents.len(), "Upload submitted");
        Ok(self.submit(Job::vector_upload(collection_name, documents, metadata)))
    }

    /// Submit a similarity query. Fails with [`Error::CollectionNotFound`]
    /// if the collection does not exist.
    pub async fn submit_query(&self, collection_name: &str, query: &str) -> Result<Submission> {
        if !self.store.collection_exists(collection_name).await? {
            return Err(Error::CollectionNotFound(collection_name.to_string()));
        }
        Ok(self.submit(Job::vector_query(collection_name, query)))
    }

    pub fn status(&self, id: &JobId) -> Option<StatusReport> {
        self.registry.get(id).map(|job| StatusReport {
            status: job.status,
            queue_size: self.queue.size(),
        })
    }

    /// Snapshot of the job, including partial output while it runs.
    pub fn completion(&self, id: &JobId) -> Option<Job> {
        self.registry.get(id)
    }

    /// Kind of a registered job.
    pub fn kind(&self, id: &JobId) -> Option<JobKind> {
        self.registry.get(id).map(|job| job.kind())
    }

    /// Forget a job. Unknown identifiers are ignored.
    pub fn unregister(&self, id: &JobId) {
        if self.registry.delete(id).is_some() {
            debug!(job_id = %id, "Job unregistered");
        }
    }

    pub fn health(&self) -> EngineHealth {
        EngineHealth {
            queue_size: self.queue.size(),
            queue_capacity: self.queue.capacity(),
            jobs: self.registry.len(),
        }
    }
}
