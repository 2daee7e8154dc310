//! Dynamic request batching.
//!
//! Single-item requests flow through a bounded queue into collector tasks
//! that close size/time-bounded batches and hand them to a pool of blocking
//! executor threads. Results come back per item over oneshot completion
//! handles.
//!
//! ```text
//!  handlers ──offer──► BatchQueue ──take──► collectors ──submit──► WorkerPool
//!     ▲                                                               │
//!     └────────────────── oneshot completions ───────────────────────┘
//! ```

mod collector;
mod item;
mod queue;
mod worker;

pub use item::{ItemError, ItemResult, PendingBatch, PendingItem};
pub use queue::{BatchQueue, OfferError, TakeError};
pub use worker::{WorkerHandle, WorkerPool};

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::BatcherConfig;
use crate::metrics::{status, Metrics};
use crate::model::EmbeddingModel;

/// Terminal failures of a single prediction.
#[derive(Debug, thiserror::Error)]
pub enum PredictError {
    /// The queue stayed full for the whole request deadline.
    #[error("request queue is full")]
    Overloaded,
    /// The deadline expired before a result arrived.
    #[error("request deadline exceeded")]
    DeadlineExceeded,
    /// The executor failed the batch this item was part of.
    #[error("{0}")]
    Inference(String),
    /// The batcher is shutting down.
    #[error("batcher is shutting down")]
    ShuttingDown,
}

/// The batching engine: queue, collectors and worker pool, wired together.
pub struct Batcher {
    queue: BatchQueue,
    collectors: Vec<JoinHandle<()>>,
    pool: WorkerPool,
    shutdown: CancellationToken,
    metrics: Arc<Metrics>,
}

impl Batcher {
    /// Spawn collectors and worker threads. One model instance per worker
    /// slot; each thread takes exclusive ownership of its instance.
    pub fn start(
        config: &BatcherConfig,
        models: Vec<Box<dyn EmbeddingModel>>,
        metrics: Arc<Metrics>,
    ) -> Self {
        debug_assert_eq!(models.len(), config.num_workers);

        let queue = BatchQueue::new(config.queue_capacity, metrics.clone());
        let pool = WorkerPool::start(models, metrics.clone());
        let shutdown = CancellationToken::new();

        let collectors = collector::spawn_collectors(
            config.num_collectors,
            collector::CollectorParams {
                max_batch_size: config.max_batch_size,
                batch_timeout: config.batch_timeout(),
            },
            queue.clone(),
            pool.handle(),
            metrics.clone(),
            shutdown.clone(),
        );

        tracing::info!(
            max_batch_size = config.max_batch_size,
            batch_timeout_ms = config.batch_timeout_ms,
            num_collectors = config.num_collectors,
            num_workers = config.num_workers,
            queue_capacity = config.queue_capacity,
            "batcher started"
        );

        Self {
            queue,
            collectors,
            pool,
            shutdown,
            metrics,
        }
    }

    /// Run one text through the batching pipeline under an absolute
    /// deadline covering both the queue hand-off and the wait for the
    /// result.
    pub async fn predict(&self, text: String, deadline: Duration) -> Result<Vec<f32>, PredictError> {
        let started = Instant::now();
        let (item, completion) = PendingItem::new(text);

        match self.queue.offer(item, deadline).await {
            Ok(()) => {}
            Err(OfferError::Full) => {
                self.metrics
                    .record_request(status::OVERLOADED, started.elapsed());
                return Err(PredictError::Overloaded);
            }
            Err(OfferError::Closed) => {
                self.metrics.record_request(status::ERROR, started.elapsed());
                return Err(PredictError::ShuttingDown);
            }
        }

        let remaining = deadline.saturating_sub(started.elapsed());
        match tokio::time::timeout(remaining, completion).await {
            Ok(Ok(Ok(embedding))) => {
                self.metrics
                    .record_request(status::SUCCESS, started.elapsed());
                Ok(embedding)
            }
            Ok(Ok(Err(error))) => {
                self.metrics.record_request(status::ERROR, started.elapsed());
                Err(PredictError::Inference(error.to_string()))
            }
            // The sender was dropped without resolving; only happens while
            // the pipeline is being torn down.
            Ok(Err(_)) => {
                self.metrics.record_request(status::ERROR, started.elapsed());
                Err(PredictError::ShuttingDown)
            }
            // Dropping the completion receiver is the cancel signal the
            // collectors and workers observe.
            Err(_) => {
                self.metrics
                    .record_request(status::TIMEOUT, started.elapsed());
                Err(PredictError::DeadlineExceeded)
            }
        }
    }

    /// Items currently waiting in the queue.
    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }

    /// Batches currently executing on worker threads.
    pub fn inflight_batches(&self) -> i64 {
        self.metrics.inflight_batches.get()
    }

    /// Stop collectors, drain the worker pool and join its threads.
    pub async fn shutdown(self) {
        tracing::info!("batcher shutting down");
        self.shutdown.cancel();
        for handle in self.collectors {
            let _ = handle.await;
        }
        self.pool.shutdown();
        tracing::info!("batcher shutdown complete");
    }
}
