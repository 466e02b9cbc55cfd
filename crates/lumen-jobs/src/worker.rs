//! Worker pool draining the task queue.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use lumen_core::{defaults, JobId, JobKind, JobStatus, Result};

use crate::handler::{JobContext, JobHandler, JobOutput, JobResult};
use crate::queue::TaskQueue;
use crate::registry::JobRegistry;

/// Configuration for the worker pool.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Number of worker tasks draining the queue.
    pub worker_count: usize,
    /// Per-job time limit in seconds.
    pub job_timeout_secs: u64,
    /// Text appended to a chat turn when the provider fails.
    pub chat_error_text: String,
    /// Hits kept by vector queries.
    pub result_limit: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_count: defaults::WORKER_COUNT,
            job_timeout_secs: defaults::JOB_TIMEOUT_SECS,
            chat_error_text: defaults::CHAT_ERROR_TEXT.to_string(),
            result_limit: defaults::RESULT_LIMIT,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `WORKER_COUNT` | `1` | Worker tasks draining the queue |
    /// | `JOB_TIMEOUT_SECS` | `600` | Per-job time limit |
    /// | `CHAT_ERROR_TEXT` (or `CHATERROR`) | `An error occurred.` | Chat fallback text |
    /// | `RESULT_LIMIT` | `5` | Vector query top-k |
    pub fn from_env() -> Self {
        let worker_count = std::env::var("WORKER_COUNT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::WORKER_COUNT)
            .max(1);

        let job_timeout_secs = std::env::var("JOB_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(defaults::JOB_TIMEOUT_SECS);

        let chat_error_text = std::env::var("CHAT_ERROR_TEXT")
            .or_else(|_| std::env::var("CHATERROR"))
            .unwrap_or_else(|_| defaults::CHAT_ERROR_TEXT.to_string());

        let result_limit = std::env::var("RESULT_LIMIT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::RESULT_LIMIT)
            .max(1);

        Self {
            worker_count,
            job_timeout_secs,
            chat_error_text,
            result_limit,
        }
    }

    /// Set the number of worker tasks.
    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count.max(1);
        self
    }

    /// Set the per-job time limit.
    pub fn with_job_timeout(mut self, secs: u64) -> Self {
        self.job_timeout_secs = secs;
        self
    }

    /// Set the chat fallback text.
    pub fn with_chat_error_text(mut self, text: impl Into<String>) -> Self {
        self.chat_error_text = text.into();
        self
    }

    /// Set the vector query top-k.
    pub fn with_result_limit(mut self, limit: usize) -> Self {
        self.result_limit = limit.max(1);
        self
    }
}

/// Event emitted by the worker pool.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// A worker task started.
    WorkerStarted { worker: usize },
    /// A worker task stopped.
    WorkerStopped { worker: usize },
    /// A job moved to processing.
    JobStarted { job_id: JobId, kind: JobKind },
    /// A job finished normally.
    JobCompleted { job_id: JobId, kind: JobKind },
    /// A job finished with a fallback result.
    JobDegraded {
        job_id: JobId,
        kind: JobKind,
        diagnostic: String,
    },
    /// A job failed.
    JobFailed {
        job_id: JobId,
        kind: JobKind,
        error: String,
    },
    /// A dequeued job was no longer registered, or was unregistered while
    /// processing.
    JobDropped { job_id: JobId },
}

/// Handle for controlling a running worker pool.
///
/// Dropping the handle also stops the workers once they are idle.
pub struct WorkerHandle {
    shutdown_tx: watch::Sender<bool>,
    event_rx: broadcast::Receiver<WorkerEvent>,
    tasks: Vec<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Signal every worker to stop after its current job.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(true)
            .map_err(|_| lumen_core::Error::Internal("Failed to send shutdown signal".into()))?;
        Ok(())
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_rx.resubscribe()
    }

    /// Whether any worker task is still running.
    pub fn is_running(&self) -> bool {
        self.tasks.iter().any(|t| !t.is_finished())
    }

    pub fn worker_count(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for every worker task to exit.
    pub async fn join(self) {
        for task in self.tasks {
            if let Err(e) = task.await {
                error!(error = ?e, "Worker task panicked");
            }
        }
    }
}

/// Pool of workers executing jobs from the task queue.
pub struct JobWorker {
    registry: JobRegistry,
    queue: TaskQueue,
    handler: Arc<dyn JobHandler>,
    config: WorkerConfig,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl JobWorker {
    pub fn new(
        registry: JobRegistry,
        queue: TaskQueue,
        handler: Arc<dyn JobHandler>,
        config: WorkerConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(defaults::EVENT_BUS_CAPACITY);
        Self {
            registry,
            queue,
            handler,
            config,
            event_tx,
        }
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_tx.subscribe()
    }

    /// Start `worker_count` worker tasks and return a handle for control.
    pub fn start(self) -> WorkerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let event_rx = self.event_tx.subscribe();
        let worker_count = self.config.worker_count.max(1);

        let worker = Arc::new(self);
        let tasks = (0..worker_count)
            .map(|index| {
                let worker = worker.clone();
                let shutdown_rx = shutdown_rx.clone();
                tokio::spawn(async move {
                    worker.run(index, shutdown_rx).await;
                })
            })
            .collect();

        WorkerHandle {
            shutdown_tx,
            event_rx,
            tasks,
        }
    }

    #[instrument(skip(self, shutdown_rx), fields(subsystem = "jobs", component = "worker"))]
    async fn run(&self, worker: usize, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            job_timeout_secs = self.config.job_timeout_secs,
            queue_capacity = self.queue.capacity(),
            "Job worker started"
        );
        let _ = self.event_tx.send(WorkerEvent::WorkerStarted { worker });

        loop {
            if *shutdown_rx.borrow() {
                break;
            }
            let next = tokio::select! {
                _ = shutdown_rx.changed() => None,
                id = self.queue.dequeue() => id,
            };
            let Some(job_id) = next else {
                break;
            };
            self.process(job_id).await;
        }

        let _ = self.event_tx.send(WorkerEvent::WorkerStopped { worker });
        info!("Job worker stopped");
    }

    /// Run one dequeued job to a terminal status.
    async fn process(&self, job_id: JobId) {
        let start = Instant::now();

        let mut snapshot = None;
        let mut transition_error = None;
        let found = self.registry.update(&job_id, |job| {
            match job.transition(JobStatus::Processing) {
                Ok(()) => snapshot = Some(job.clone()),
                Err(e) => transition_error = Some(e),
            }
        });

        let job = match (found, snapshot) {
            (false, _) => {
                warn!(%job_id, "Dequeued job is not registered, dropping");
                let _ = self.event_tx.send(WorkerEvent::JobDropped { job_id });
                return;
            }
            (true, Some(job)) => job,
            (true, None) => {
                if let Some(e) = transition_error {
                    warn!(%job_id, error = %e, "Dequeued job cannot start, skipping");
                }
                return;
            }
        };

        let kind = job.kind();
        info!(%job_id, job_kind = %kind, "Processing job");
        let _ = self.event_tx.send(WorkerEvent::JobStarted { job_id, kind });

        let result = self.execute_isolated(job).await;
        self.finish(job_id, kind, result, start);
    }

    /// Execute in its own task so a panic or timeout fails only this job.
    async fn execute_isolated(&self, job: lumen_core::Job) -> JobResult {
        let handler = self.handler.clone();
        let kind = job.kind();
        let ctx = JobContext::new(job, self.registry.clone());
        let timeout = Duration::from_secs(self.config.job_timeout_secs);

        let task = tokio::spawn(async move { tokio::time::timeout(timeout, handler.execute(ctx)).await });

        match task.await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => self.timed_out(kind),
            Err(e) if e.is_panic() => {
                error!(error = ?e, "Job handler panicked");
                JobResult::Failed("Job handler panicked".to_string())
            }
            Err(e) => JobResult::Failed(format!("Job task cancelled: {}", e)),
        }
    }

    /// Outcome of a job cut off by the timeout. A stalled provider degrades
    /// chat and embed jobs the same way a provider error does.
    fn timed_out(&self, kind: JobKind) -> JobResult {
        let diagnostic = format!("Job exceeded timeout of {}s", self.config.job_timeout_secs);
        warn!(job_kind = %kind, diagnostic = %diagnostic, "Job timed out");
        match kind {
            JobKind::Chat => JobResult::Degraded(
                JobOutput::ChatFallback(self.config.chat_error_text.clone()),
                diagnostic,
            ),
            JobKind::Embed => JobResult::Degraded(JobOutput::Embed(None), diagnostic),
            JobKind::VectorUpload | JobKind::VectorQuery => JobResult::Failed(diagnostic),
        }
    }

    /// Apply output and terminal status as one registry update.
    fn finish(&self, job_id: JobId, kind: JobKind, result: JobResult, start: Instant) {
        let duration_ms = start.elapsed().as_millis() as u64;

        let (status, diagnostic, output) = match result {
            JobResult::Success(output) => (JobStatus::Finished, None, Some(output)),
            JobResult::Degraded(output, diagnostic) => {
                (JobStatus::Finished, Some(diagnostic), Some(output))
            }
            JobResult::Failed(error) => (JobStatus::Failed, Some(error), None),
        };

        let mut applied = Ok(());
        let recorded_diagnostic = diagnostic.clone();
        let found = self.registry.update(&job_id, |job| {
            if let Some(output) = output {
                output.apply(&mut job.payload);
            } else if let lumen_core::JobPayload::VectorUpload(upload) = &mut job.payload {
                upload.documents = Arc::default();
            }
            job.diagnostic = recorded_diagnostic;
            applied = job.transition(status);
        });

        if !found {
            debug!(%job_id, "Job unregistered before completion, result dropped");
            let _ = self.event_tx.send(WorkerEvent::JobDropped { job_id });
            return;
        }
        if let Err(e) = applied {
            error!(%job_id, error = %e, "Failed to record job result");
            return;
        }

        let event = match (status, diagnostic) {
            (JobStatus::Finished, None) => {
                info!(%job_id, job_kind = %kind, duration_ms, "Job completed");
                WorkerEvent::JobCompleted { job_id, kind }
            }
            (JobStatus::Finished, Some(diagnostic)) => {
                warn!(%job_id, job_kind = %kind, duration_ms, degraded = true, %diagnostic, "Job completed with fallback result");
                WorkerEvent::JobDegraded {
                    job_id,
                    kind,
                    diagnostic,
                }
            }
            (_, error) => {
                let error = error.unwrap_or_default();
                warn!(%job_id, job_kind = %kind, duration_ms, %error, "Job failed");
                WorkerEvent::JobFailed {
                    job_id,
                    kind,
                    error,
                }
            }
        };
        let _ = self.event_tx.send(event);
    }
}
