//! Fixed-size pool of executor threads.
//!
//! Each thread owns its own model instance (the underlying runtime is not
//! re-entrant) and loops on a blocking receive. The intake channel is
//! bounded to the worker count, so a collector submitting into a saturated
//! pool parks briefly instead of fanning out unbounded in-flight batches.

use std::sync::Arc;
use std::time::Instant;

use crate::batcher::item::{ItemError, PendingBatch};
use crate::metrics::Metrics;
use crate::model::EmbeddingModel;

/// The pool stopped accepting batches (shutdown in progress).
#[derive(Debug, thiserror::Error)]
#[error("worker pool closed")]
pub struct PoolClosed;

/// Cloneable submission side of the pool, handed to collectors.
#[derive(Clone)]
pub struct WorkerHandle {
    intake: flume::Sender<PendingBatch>,
}

impl WorkerHandle {
    /// Submit a batch. Waits only while every worker slot is busy.
    pub async fn submit(&self, batch: PendingBatch) -> Result<(), PoolClosed> {
        self.intake.send_async(batch).await.map_err(|_| PoolClosed)
    }
}

pub struct WorkerPool {
    intake: flume::Sender<PendingBatch>,
    threads: Vec<std::thread::JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn one executor thread per model instance. Intake capacity equals
    /// the worker count.
    pub fn start(models: Vec<Box<dyn EmbeddingModel>>, metrics: Arc<Metrics>) -> Self {
        let (tx, rx) = flume::bounded::<PendingBatch>(models.len());

        let threads = models
            .into_iter()
            .enumerate()
            .map(|(slot, model)| {
                let rx = rx.clone();
                let metrics = metrics.clone();
                std::thread::Builder::new()
                    .name(format!("inference-worker-{}", slot))
                    .spawn(move || worker_loop(slot, model, rx, metrics))
                    .expect("spawn worker thread")
            })
            .collect();

        Self { intake: tx, threads }
    }

    pub fn handle(&self) -> WorkerHandle {
        WorkerHandle {
            intake: self.intake.clone(),
        }
    }

    /// Close the intake and wait for workers to drain and exit.
    pub fn shutdown(self) {
        drop(self.intake);
        for thread in self.threads {
            let _ = thread.join();
        }
    }
}

fn worker_loop(
    slot: usize,
    model: Box<dyn EmbeddingModel>,
    rx: flume::Receiver<PendingBatch>,
    metrics: Arc<Metrics>,
) {
    while let Ok(batch) = rx.recv() {
        execute_batch(slot, model.as_ref(), batch, &metrics);
    }
    tracing::debug!(slot, "worker thread exiting");
}

/// Run one batch and resolve every contained completion.
///
/// Per-item results map positionally; any executor failure (including an
/// output-count mismatch) resolves the whole batch with the same error.
/// Failures never propagate out of the worker thread.
fn execute_batch(slot: usize, model: &dyn EmbeddingModel, batch: PendingBatch, metrics: &Metrics) {
    let texts: Vec<String> = batch.items.iter().map(|i| i.text.clone()).collect();
    let wait_time = batch.wait_time();

    metrics.inflight_batches.inc();
    let started = Instant::now();
    let result = model.embed_batch(&texts);
    let inference_time = started.elapsed();
    metrics.inflight_batches.dec();
    metrics.inference_time.observe(inference_time.as_secs_f64());

    match result {
        Ok(outputs) if outputs.len() == batch.items.len() => {
            tracing::info!(
                slot,
                batch_size = batch.len(),
                wait_ms = wait_time.as_millis() as u64,
                inference_ms = inference_time.as_millis() as u64,
                "Batch processed"
            );
            for (item, embedding) in batch.items.into_iter().zip(outputs) {
                item.complete(Ok(embedding));
            }
        }
        Ok(outputs) => {
            tracing::error!(
                slot,
                expected = batch.items.len(),
                got = outputs.len(),
                "Model returned wrong output count"
            );
            let error = ItemError::InferenceFailed(format!(
                "model returned {} outputs for {} inputs",
                outputs.len(),
                batch.items.len()
            ));
            for item in batch.items {
                item.complete(Err(error.clone()));
            }
        }
        Err(e) => {
            tracing::error!(slot, error = %e, "Batch inference failed");
            let error = ItemError::InferenceFailed(e.to_string());
            for item in batch.items {
                item.complete(Err(error.clone()));
            }
        }
    }
}
