//! Deterministic feature-hashing embedder.
//!
//! Every lowercase alphanumeric word is hashed with SHA-256 into one of
//! `dims` buckets with a ±1 sign, and the resulting vector is L2-normalised.
//! Texts sharing vocabulary land close together; texts with no words in
//! common are (barring bucket collisions) orthogonal. No model download, no
//! network, identical output on every platform.

use sha2::{Digest, Sha256};

use super::{normalize_l2, EmbeddingProvider};
use crate::error::Result;

pub const DEFAULT_HASH_DIMS: usize = 384;

pub struct HashProvider {
    dims: usize,
}

impl HashProvider {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dims];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let digest = Sha256::digest(word.to_lowercase().as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dims as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        normalize_l2(vector)
    }
}

impl EmbeddingProvider for HashProvider {
    fn model_name(&self) -> &str {
        "hash"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}
