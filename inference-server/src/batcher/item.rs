//! In-flight request types for the batching pipeline.

use std::time::{Duration, Instant};

use tokio::sync::oneshot;

/// Error delivered to every item of a failed batch.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ItemError {
    #[error("inference failed: {0}")]
    InferenceFailed(String),
}

pub type ItemResult = Result<Vec<f32>, ItemError>;

/// One in-flight prediction request.
///
/// The oneshot sender is the completion handle; it is resolved at most once
/// by construction. It doubles as the cancel signal: the ingress task drops
/// its receiver when it stops waiting (deadline expiry or client
/// disconnect), at which point `is_cancelled` turns true.
#[derive(Debug)]
pub struct PendingItem {
    pub text: String,
    pub enqueued_at: Instant,
    completion: oneshot::Sender<ItemResult>,
}

impl PendingItem {
    pub fn new(text: String) -> (Self, oneshot::Receiver<ItemResult>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                text,
                enqueued_at: Instant::now(),
                completion: tx,
            },
            rx,
        )
    }

    /// True once the caller has stopped waiting for this item.
    pub fn is_cancelled(&self) -> bool {
        self.completion.is_closed()
    }

    /// Resolve the completion handle. A send failure means the caller went
    /// away in the meantime; the result is simply discarded.
    pub fn complete(self, result: ItemResult) {
        let _ = self.completion.send(result);
    }
}

/// A closed batch, ready for the worker pool.
///
/// `opened_at` is the enqueue time of the first item; the growth deadline
/// is anchored there, so the wait time below is the head-of-line delay the
/// first item actually experienced.
pub struct PendingBatch {
    pub items: Vec<PendingItem>,
    pub opened_at: Instant,
    pub formed_at: Instant,
}

impl PendingBatch {
    pub fn close(items: Vec<PendingItem>, opened_at: Instant) -> Self {
        debug_assert!(!items.is_empty());
        Self {
            items,
            opened_at,
            formed_at: Instant::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Time from the first item's arrival to batch closure.
    pub fn wait_time(&self) -> Duration {
        self.formed_at.duration_since(self.opened_at)
    }
}
