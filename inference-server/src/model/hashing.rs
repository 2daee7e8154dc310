//! Deterministic feature-hashing embedder.
//!
//! Maps character trigrams into a fixed-dimension vector with FNV-1a
//! feature hashing, then L2-normalizes. Deterministic, dependency-free and
//! cheap, which makes it the default model for standalone deployments and
//! the test suite. The vectors carry real locality (shared trigrams move
//! shared dimensions) without pretending to be a trained model.

use super::{EmbeddingModel, ModelError};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let chars: Vec<char> = text.chars().collect();

        // Character trigrams over the padded text; unigram fallback keeps
        // one- and two-character inputs from embedding to zero.
        if chars.len() < 3 {
            for window in chars.iter() {
                let mut buf = [0u8; 4];
                let hash = fnv1a(window.encode_utf8(&mut buf).as_bytes());
                self.accumulate(&mut vector, hash);
            }
        } else {
            for window in chars.windows(3) {
                let gram: String = window.iter().collect();
                let hash = fnv1a(gram.as_bytes());
                self.accumulate(&mut vector, hash);
            }
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }

    fn accumulate(&self, vector: &mut [f32], hash: u64) {
        let index = (hash % self.dimension as u64) as usize;
        // Sign bit from the upper half decorrelates colliding features.
        let sign = if hash & (1 << 63) == 0 { 1.0 } else { -1.0 };
        vector[index] += sign;
    }
}

impl EmbeddingModel for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash-embedder-v1"
    }

    fn device(&self) -> &str {
        "cpu"
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_matches_input_length_and_dimension() {
        let model = HashEmbedder::new(64);
        let texts = vec!["alpha".to_string(), "beta".to_string(), "gamma".to_string()];
        let out = model.embed_batch(&texts).unwrap();
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|v| v.len() == 64));
    }

    #[test]
    fn test_deterministic() {
        let model = HashEmbedder::new(32);
        let texts = vec!["hello world".to_string()];
        let a = model.embed_batch(&texts).unwrap();
        let b = model.embed_batch(&texts).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_l2_normalized() {
        let model = HashEmbedder::new(128);
        let out = model
            .embed_batch(&["the quick brown fox".to_string()])
            .unwrap();
        let norm: f32 = out[0].iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_short_inputs_are_nonzero() {
        let model = HashEmbedder::new(16);
        let out = model.embed_batch(&["a".to_string(), "ab".to_string()]).unwrap();
        assert!(out[0].iter().any(|v| *v != 0.0));
        assert!(out[1].iter().any(|v| *v != 0.0));
    }

    #[test]
    fn test_different_texts_differ() {
        let model = HashEmbedder::new(128);
        let out = model
            .embed_batch(&["first sentence".to_string(), "second sentence".to_string()])
            .unwrap();
        assert_ne!(out[0], out[1]);
    }
}
