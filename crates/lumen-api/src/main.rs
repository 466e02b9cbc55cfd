//! lumen-api server binary.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use lumen_api::{router, AppState};
use lumen_core::{defaults, ChatBackend, EmbeddingBackend, InferenceBackend};
use lumen_inference::{OllamaBackend, OpenAIBackend};
use lumen_jobs::{
    JobExecutor, JobRegistry, JobService, JobWorker, RetentionPolicy, RetentionSweeper, TaskQueue,
    WorkerConfig, WorkerEvent,
};

const DEFAULT_LOG_FILTER: &str = "lumen_api=debug,lumen_jobs=debug,tower_http=debug";

/// Log output read from `LOG_FORMAT` (`text|json`), `LOG_FILE` and `LOG_ANSI`.
/// Level filtering comes from `RUST_LOG`.
#[derive(Debug, PartialEq)]
struct LogSettings {
    json: bool,
    file: Option<PathBuf>,
    ansi: Option<bool>,
}

impl LogSettings {
    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            json: get("LOG_FORMAT").is_some_and(|v| v.trim().eq_ignore_ascii_case("json")),
            file: get("LOG_FILE")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            ansi: get("LOG_ANSI").map(|v| v == "true" || v == "1"),
        }
    }
}

/// Install the global subscriber. A log file rotates daily; the returned
/// guard flushes it and must live until shutdown.
fn init_tracing(settings: &LogSettings) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

    let (writer, guard) = match &settings.file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let name = path
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("lumen-api.log"));
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, name));
            (BoxMakeWriter::new(writer), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stdout), None),
    };

    // Colors only on the terminal unless overridden
    let ansi = settings.ansi.unwrap_or(settings.file.is_none());
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi);
    let registry = tracing_subscriber::registry().with(filter);
    if settings.json {
        registry.with(layer.json()).init();
    } else {
        registry.with(layer).init();
    }
    guard
}

/// The three views of one inference backend needed at startup.
struct Providers {
    embedder: Arc<dyn EmbeddingBackend>,
    chat: Arc<dyn ChatBackend>,
    health: Arc<dyn InferenceBackend>,
}

impl Providers {
    fn from_backend<B: InferenceBackend + 'static>(backend: B) -> Self {
        let backend = Arc::new(backend);
        Self {
            embedder: backend.clone(),
            chat: backend.clone(),
            health: backend,
        }
    }
}

/// Select the inference backend from `INFERENCE_BACKEND` (`ollama` or `openai`).
fn providers_from_env() -> anyhow::Result<Providers> {
    let name = std::env::var("INFERENCE_BACKEND").unwrap_or_else(|_| "ollama".to_string());
    match name.trim().to_lowercase().as_str() {
        "ollama" => Ok(Providers::from_backend(OllamaBackend::from_env())),
        "openai" => Ok(Providers::from_backend(OpenAIBackend::from_env()?)),
        other => anyhow::bail!("Unknown INFERENCE_BACKEND '{}' (expected ollama|openai)", other),
    }
}

/// Log worker events until the pool shuts down.
async fn log_worker_events(mut events: broadcast::Receiver<WorkerEvent>) {
    loop {
        match events.recv().await {
            Ok(WorkerEvent::JobCompleted { job_id, kind }) => {
                debug!(job_id = %job_id, job_kind = %kind, "Job completed");
            }
            Ok(WorkerEvent::JobDegraded {
                job_id,
                kind,
                diagnostic,
            }) => {
                warn!(job_id = %job_id, job_kind = %kind, diagnostic = %diagnostic, "Job degraded");
            }
            Ok(WorkerEvent::JobFailed {
                job_id,
                kind,
                error,
            }) => {
                warn!(job_id = %job_id, job_kind = %kind, error = %error, "Job failed");
            }
            Ok(WorkerEvent::JobDropped { job_id }) => {
                debug!(job_id = %job_id, "Job dropped");
            }
            Ok(other) => debug!(event = ?other, "Worker event"),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Worker event log lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let log = LogSettings::from_lookup(|key| std::env::var(key).ok());
    let _log_guard = init_tracing(&log);
    let log_target = log
        .file
        .as_deref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(stdout)".to_string());
    info!(log_json = log.json, log_file = %log_target, "Logging initialized");

    // Get configuration from environment
    let host = std::env::var("HOST").unwrap_or_else(|_| defaults::SERVER_HOST.to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(defaults::SERVER_PORT);

    // Providers
    let providers = providers_from_env()?;
    match providers.health.health_check().await {
        Ok(true) => info!(
            embed_model = providers.embedder.model_name(),
            gen_model = providers.chat.model_name(),
            "Inference backend reachable"
        ),
        Ok(false) => warn!("Inference backend reported unhealthy; jobs will degrade until it recovers"),
        Err(e) => warn!(error = %e, "Inference backend health check failed"),
    }
    let store = lumen_vector::store_from_env()?;
    info!(vector_store = store.name(), "Vector store ready");

    // Job engine
    let registry = JobRegistry::new();
    let queue = TaskQueue::from_env();
    let worker_config = WorkerConfig::from_env();
    let executor = JobExecutor::new(providers.embedder, providers.chat, store.clone())
        .with_chat_error_text(worker_config.chat_error_text.clone())
        .with_result_limit(worker_config.result_limit);

    let worker = JobWorker::new(
        registry.clone(),
        queue.clone(),
        Arc::new(executor),
        worker_config,
    );
    let worker_handle = worker.start();
    let workers = worker_handle.worker_count();
    tokio::spawn(log_worker_events(worker_handle.events()));

    let retention = RetentionSweeper::new(registry.clone(), RetentionPolicy::from_env()).start();

    let state = AppState::new(JobService::new(registry, queue, store), workers);
    let app = router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!(workers, "Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Drain
    if let Some(retention) = retention {
        retention.stop().await;
    }
    worker_handle.shutdown().await?;
    worker_handle.join().await;
    info!("Server stopped");

    Ok(())
}
