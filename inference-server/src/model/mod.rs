//! Embedding model abstraction layer.
//!
//! The batcher treats the model as an opaque, blocking, shape-preserving
//! function: `N` input texts in, `N` embedding vectors out, `output[i]`
//! corresponding to `input[i]`. Implementations are not re-entrant; each
//! worker thread owns its own instance.

mod hashing;
mod sleep;

pub use hashing::HashEmbedder;
pub use sleep::SleepModel;

use crate::config::ModelConfig;

/// Errors from a model invocation.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("inference failed: {0}")]
    Inference(String),
}

/// A blocking, batch-oriented embedding model.
///
/// `embed_batch` blocks the calling thread for the duration of the
/// computation; callers must run it off the async runtime.
pub trait EmbeddingModel: Send {
    /// Model identifier reported to clients.
    fn model_name(&self) -> &str;

    /// Device the model runs on (e.g. "cpu").
    fn device(&self) -> &str;

    /// Embed a batch of texts. Returns exactly one vector per input, in
    /// input order.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError>;
}

/// Build one model instance per worker slot from configuration.
pub fn build_models(
    config: &ModelConfig,
    count: usize,
) -> Result<Vec<Box<dyn EmbeddingModel>>, ModelError> {
    (0..count)
        .map(|_| -> Result<Box<dyn EmbeddingModel>, ModelError> {
            match config.kind.as_str() {
                "hash" => Ok(Box::new(HashEmbedder::new(config.dimension))),
                "sleep" => Ok(Box::new(SleepModel::with_dimension(config.dimension))),
                other => Err(ModelError::Inference(format!(
                    "unknown model kind '{}'",
                    other
                ))),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_models_hash() {
        let config = ModelConfig {
            kind: "hash".to_string(),
            dimension: 16,
        };
        let models = build_models(&config, 3).unwrap();
        assert_eq!(models.len(), 3);
        assert_eq!(models[0].model_name(), "hash-embedder-v1");
    }

    #[test]
    fn test_build_models_rejects_unknown_kind() {
        let config = ModelConfig {
            kind: "quantum".to_string(),
            dimension: 16,
        };
        assert!(build_models(&config, 1).is_err());
    }
}
