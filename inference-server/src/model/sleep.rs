//! Latency-simulating model for load tests and batcher tests.

use std::time::Duration;

use super::{EmbeddingModel, ModelError};

/// Simulates a blocking model with a base latency plus a per-item cost.
/// Embeddings are a fixed-dimension encoding of the input length, which is
/// enough to assert positional correspondence in tests.
pub struct SleepModel {
    base_latency: Duration,
    per_item_latency: Duration,
    dimension: usize,
}

impl SleepModel {
    pub fn new(base_latency: Duration, per_item_latency: Duration, dimension: usize) -> Self {
        Self {
            base_latency,
            per_item_latency,
            dimension,
        }
    }

    pub fn with_dimension(dimension: usize) -> Self {
        Self::new(Duration::from_millis(50), Duration::from_millis(5), dimension)
    }
}

impl EmbeddingModel for SleepModel {
    fn model_name(&self) -> &str {
        "sleep-model"
    }

    fn device(&self) -> &str {
        "cpu"
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        let total = self.base_latency + self.per_item_latency * texts.len() as u32;
        std::thread::sleep(total);

        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0f32; self.dimension];
                if !v.is_empty() {
                    v[0] = t.chars().count() as f32;
                }
                v
            })
            .collect())
    }
}
