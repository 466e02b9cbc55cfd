//! # lumen-jobs
//!
//! Asynchronous job engine for lumen.
//!
//! This crate provides:
//! - A sharded, thread-safe job registry
//! - A bounded FIFO task queue with rejection at capacity
//! - A worker pool that runs chat, embed, upload and query jobs
//! - Content-sniffing document extraction (PDF, DOCX, XLSX, PPTX, HTML, text)
//! - A retention sweeper for expired terminal jobs
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use lumen_jobs::{JobExecutor, JobRegistry, JobService, JobWorker, TaskQueue, WorkerConfig};
//!
//! let registry = JobRegistry::new();
//! let queue = TaskQueue::new(1000);
//! let executor = JobExecutor::new(backend.clone(), backend, store.clone());
//!
//! let handle = JobWorker::new(registry.clone(), queue.clone(), Arc::new(executor), WorkerConfig::default())
//!     .start();
//!
//! let service = JobService::new(registry, queue, store);
//! let submission = service.submit_embed("hello");
//! println!("{:?}", service.status(&submission.uuid));
//!
//! handle.shutdown().await?;
//! ```

pub mod adapters;
pub mod extraction;
pub mod handler;
pub mod queue;
pub mod registry;
pub mod retention;
pub mod service;
pub mod worker;

// Re-export core types
pub use lumen_core::*;

pub use extraction::DocumentExtractor;
pub use handler::{JobContext, JobExecutor, JobHandler, JobOutput, JobResult};
pub use queue::TaskQueue;
pub use registry::JobRegistry;
pub use retention::{RetentionHandle, RetentionPolicy, RetentionSweeper};
pub use service::{EngineHealth, JobService, StatusReport, Submission};
pub use worker::{JobWorker, WorkerConfig, WorkerEvent, WorkerHandle};

pub use adapters::{
    DocxAdapter, HtmlAdapter, PdfTextAdapter, PptxAdapter, TextNativeAdapter, XlsxAdapter,
};
