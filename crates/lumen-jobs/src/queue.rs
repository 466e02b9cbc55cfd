//! Bounded FIFO of job identifiers.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{trace, warn};

use lumen_core::{defaults, Error, JobId, Result};

/// Bounded task queue with non-blocking enqueue and blocking dequeue.
///
/// Cloning shares the same queue. Pool workers take turns on the receiving
/// end, so identifiers leave in exactly the order they arrived.
#[derive(Clone)]
pub struct TaskQueue {
    tx: mpsc::Sender<JobId>,
    rx: Arc<Mutex<mpsc::Receiver<JobId>>>,
    capacity: usize,
}

impl TaskQueue {
    /// Create a queue holding at most `capacity` identifiers, clamped to
    /// `1..=MAX_QUEUE_CAPACITY`.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, defaults::MAX_QUEUE_CAPACITY);
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
            capacity,
        }
    }

    /// Capacity from `QUEUE_CAPACITY`, falling back to the default.
    pub fn from_env() -> Self {
        Self::new(capacity_from(std::env::var("QUEUE_CAPACITY").ok().as_deref()))
    }

    /// Append an identifier, failing with [`Error::QueueFull`] at capacity.
    pub fn enqueue(&self, id: JobId) -> Result<()> {
        self.tx.try_send(id).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => Error::QueueFull(self.capacity),
            mpsc::error::TrySendError::Closed(_) => {
                Error::Internal("task queue receiver dropped".to_string())
            }
        })?;
        trace!(job_id = %id, "Enqueued job");
        Ok(())
    }

    /// Wait for the next identifier.
    ///
    /// Returns `None` only if the queue has been closed. Cancel safe: an
    /// identifier is never lost when the returned future is dropped.
    pub async fn dequeue(&self) -> Option<JobId> {
        let mut rx = self.rx.lock().await;
        rx.recv().await
    }

    /// Current depth. Advisory: it may change before the caller acts on it.
    pub fn size(&self) -> usize {
        self.capacity - self.tx.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Parse a configured capacity. Unparseable values fall back to the
/// default, out-of-range values are clamped.
fn capacity_from(raw: Option<&str>) -> usize {
    let Some(raw) = raw else {
        return defaults::QUEUE_CAPACITY;
    };
    match raw.trim().parse::<usize>() {
        Ok(n) if (1..=defaults::MAX_QUEUE_CAPACITY).contains(&n) => n,
        Ok(n) => {
            let clamped = n.clamp(1, defaults::MAX_QUEUE_CAPACITY);
            warn!(requested = n, capacity = clamped, "QUEUE_CAPACITY out of range, clamped");
            clamped
        }
        Err(_) => {
            warn!(value = raw, capacity = defaults::QUEUE_CAPACITY, "Invalid QUEUE_CAPACITY, using default");
            defaults::QUEUE_CAPACITY
        }
    }
}
