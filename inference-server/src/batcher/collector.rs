//! Batch collectors: drain the queue into size/time-bounded batches.
//!
//! Several identical collector tasks run concurrently. While the worker
//! pool runs one collector's batch, the others keep forming the next ones,
//! overlapping batch formation with inference.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::batcher::item::PendingBatch;
use crate::batcher::queue::{BatchQueue, TakeError};
use crate::batcher::worker::WorkerHandle;
use crate::metrics::Metrics;

pub struct CollectorParams {
    pub max_batch_size: usize,
    pub batch_timeout: Duration,
}

pub fn spawn_collectors(
    count: usize,
    params: CollectorParams,
    queue: BatchQueue,
    pool: WorkerHandle,
    metrics: Arc<Metrics>,
    shutdown: CancellationToken,
) -> Vec<JoinHandle<()>> {
    let params = Arc::new(params);
    (0..count)
        .map(|id| {
            let queue = queue.clone();
            let pool = pool.clone();
            let metrics = metrics.clone();
            let shutdown = shutdown.clone();
            let params = params.clone();
            tokio::spawn(async move {
                collector_loop(id, &params, queue, pool, metrics, shutdown).await;
            })
        })
        .collect()
}

async fn collector_loop(
    id: usize,
    params: &CollectorParams,
    queue: BatchQueue,
    pool: WorkerHandle,
    metrics: Arc<Metrics>,
    shutdown: CancellationToken,
) {
    loop {
        // Open a batch: block until an item arrives. Items whose caller has
        // already gone away are consumed and dropped here; the caller
        // observed its own timeout, so nobody is waiting on them.
        let first = tokio::select! {
            biased;
            () = shutdown.cancelled() => {
                tracing::debug!(collector_id = id, "collector shutting down");
                return;
            }
            taken = queue.take() => match taken {
                Ok(item) => item,
                Err(_) => return,
            },
        };

        if first.is_cancelled() {
            metrics.cancelled_items.inc();
            continue;
        }

        // The first item's arrival sets the clock, not this task's wakeup:
        // a backlog-delayed item still closes its batch within batch_timeout
        // of entering the queue.
        let opened_at = first.enqueued_at;
        let mut buffer = vec![first];

        while buffer.len() < params.max_batch_size {
            let remaining = params.batch_timeout.saturating_sub(opened_at.elapsed());
            if remaining.is_zero() {
                break;
            }
            match queue.take_timeout(remaining).await {
                Ok(item) => {
                    if item.is_cancelled() {
                        metrics.cancelled_items.inc();
                        continue;
                    }
                    buffer.push(item);
                }
                Err(TakeError::Timeout) => break,
                Err(TakeError::Closed) => break,
            }
        }

        let batch = PendingBatch::close(buffer, opened_at);
        metrics.batch_size.observe(batch.len() as f64);
        metrics
            .batch_wait_time
            .observe(batch.wait_time().as_secs_f64());

        tracing::debug!(
            collector_id = id,
            batch_size = batch.len(),
            wait_ms = batch.wait_time().as_millis() as u64,
            "dispatching batch"
        );

        // Bounded intake: parks briefly while every worker slot is busy.
        if pool.submit(batch).await.is_err() {
            tracing::debug!(collector_id = id, "worker pool closed, collector exiting");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batcher::item::PendingItem;
    use crate::batcher::worker::WorkerPool;
    use crate::model::HashEmbedder;

    fn setup(
        max_batch_size: usize,
        batch_timeout: Duration,
        collectors: usize,
    ) -> (BatchQueue, Vec<JoinHandle<()>>, CancellationToken, Arc<Metrics>, WorkerPool) {
        let metrics = Arc::new(Metrics::new());
        let queue = BatchQueue::new(64, metrics.clone());
        let pool = WorkerPool::start(vec![Box::new(HashEmbedder::new(8))], metrics.clone());
        let shutdown = CancellationToken::new();
        let handles = spawn_collectors(
            collectors,
            CollectorParams {
                max_batch_size,
                batch_timeout,
            },
            queue.clone(),
            pool.handle(),
            metrics.clone(),
            shutdown.clone(),
        );
        (queue, handles, shutdown, metrics, pool)
    }

    #[tokio::test]
    async fn test_partial_batch_dispatched_at_timeout() {
        let (queue, handles, shutdown, metrics, pool) =
            setup(4, Duration::from_millis(20), 1);

        let mut receivers = Vec::new();
        for text in ["a", "b", "c"] {
            let (item, rx) = PendingItem::new(text.to_string());
            queue.offer(item, Duration::from_millis(10)).await.unwrap();
            receivers.push(rx);
        }

        // All three resolve from a single batch despite the batch never
        // filling.
        for rx in receivers {
            let result = tokio::time::timeout(Duration::from_millis(500), rx)
                .await
                .expect("resolved within deadline")
                .unwrap();
            assert!(result.is_ok());
        }
        assert_eq!(metrics.batch_size.get_sample_count(), 1);

        shutdown.cancel();
        for h in handles {
            let _ = h.await;
        }
        pool.shutdown();
    }

    #[tokio::test]
    async fn test_full_batch_dispatched_without_waiting_out_timeout() {
        let (queue, handles, shutdown, metrics, pool) =
            setup(2, Duration::from_secs(5), 1);

        let (item_a, rx_a) = PendingItem::new("a".to_string());
        let (item_b, rx_b) = PendingItem::new("b".to_string());
        queue.offer(item_a, Duration::from_millis(10)).await.unwrap();
        queue.offer(item_b, Duration::from_millis(10)).await.unwrap();

        // Size threshold closes the batch long before the 5 s timeout.
        let started = std::time::Instant::now();
        assert!(rx_a.await.unwrap().is_ok());
        assert!(rx_b.await.unwrap().is_ok());
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(metrics.batch_size.get_sample_sum(), 2.0);

        shutdown.cancel();
        for h in handles {
            let _ = h.await;
        }
        pool.shutdown();
    }

    #[tokio::test]
    async fn test_cancelled_item_skipped_before_batching() {
        let (queue, handles, shutdown, metrics, pool) =
            setup(4, Duration::from_millis(20), 1);

        let (cancelled, cancelled_rx) = PendingItem::new("gone".to_string());
        drop(cancelled_rx);
        let (live, live_rx) = PendingItem::new("here".to_string());

        queue.offer(cancelled, Duration::from_millis(10)).await.unwrap();
        queue.offer(live, Duration::from_millis(10)).await.unwrap();

        assert!(live_rx.await.unwrap().is_ok());
        assert_eq!(metrics.cancelled_items.get(), 1);
        // Only the live item was batched.
        assert_eq!(metrics.batch_size.get_sample_sum(), 1.0);

        shutdown.cancel();
        for h in handles {
            let _ = h.await;
        }
        pool.shutdown();
    }

    #[tokio::test]
    async fn test_single_item_batch_with_max_size_one() {
        let (queue, handles, shutdown, _metrics, pool) =
            setup(1, Duration::from_secs(5), 1);

        let (item, rx) = PendingItem::new("solo".to_string());
        queue.offer(item, Duration::from_millis(10)).await.unwrap();

        let started = std::time::Instant::now();
        assert!(rx.await.unwrap().is_ok());
        // Dispatched immediately, no timeout wait.
        assert!(started.elapsed() < Duration::from_secs(1));

        shutdown.cancel();
        for h in handles {
            let _ = h.await;
        }
        pool.shutdown();
    }
}
