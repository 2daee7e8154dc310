//! Bounded hand-off queue between ingress handlers and batch collectors.
//!
//! Many producers (request handlers) offer items, many consumers
//! (collectors) take them. FIFO across successful offers; flume wakes
//! blocked receivers in order, so no collector can starve another.

use std::sync::Arc;
use std::time::Duration;

use crate::batcher::item::PendingItem;
use crate::metrics::Metrics;

/// Failure to publish an item.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum OfferError {
    /// No capacity freed up before the deadline.
    #[error("queue full")]
    Full,
    /// The batcher is shutting down.
    #[error("queue closed")]
    Closed,
}

/// Failure to take an item.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum TakeError {
    #[error("take timed out")]
    Timeout,
    #[error("queue closed")]
    Closed,
}

#[derive(Clone)]
pub struct BatchQueue {
    tx: flume::Sender<PendingItem>,
    rx: flume::Receiver<PendingItem>,
    metrics: Arc<Metrics>,
}

impl BatchQueue {
    pub fn new(capacity: usize, metrics: Arc<Metrics>) -> Self {
        let (tx, rx) = flume::bounded(capacity);
        Self { tx, rx, metrics }
    }

    /// Publish an item, waiting up to `timeout` for a free slot.
    pub async fn offer(&self, item: PendingItem, timeout: Duration) -> Result<(), OfferError> {
        match tokio::time::timeout(timeout, self.tx.send_async(item)).await {
            Ok(Ok(())) => {
                self.metrics.queue_size.set(self.tx.len() as i64);
                Ok(())
            }
            Ok(Err(_)) => Err(OfferError::Closed),
            Err(_) => Err(OfferError::Full),
        }
    }

    /// Take one item, waiting indefinitely.
    pub async fn take(&self) -> Result<PendingItem, TakeError> {
        let item = self.rx.recv_async().await.map_err(|_| TakeError::Closed)?;
        self.metrics.queue_size.set(self.rx.len() as i64);
        Ok(item)
    }

    /// Take one item, waiting up to `timeout`.
    pub async fn take_timeout(&self, timeout: Duration) -> Result<PendingItem, TakeError> {
        match tokio::time::timeout(timeout, self.rx.recv_async()).await {
            Ok(Ok(item)) => {
                self.metrics.queue_size.set(self.rx.len() as i64);
                Ok(item)
            }
            Ok(Err(_)) => Err(TakeError::Closed),
            Err(_) => Err(TakeError::Timeout),
        }
    }

    /// Current number of queued items.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
