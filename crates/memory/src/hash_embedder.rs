//! Deterministic hash embedder.
//!
//! Each lowercase word is expanded into a pseudo-random direction seeded
//! by SHA-256; a text embeds to the normalised sum of its word directions.
//! Texts that share words land close together, identical texts embed
//! identically. No model download, no network.

use async_trait::async_trait;
use engram_core::embedding::Embedder;
use engram_core::error::EmbeddingError;
use sha2::{Digest, Sha256};

pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    /// Synchronous embedding, shared by the async trait methods.
    pub fn embed_sync(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if self.dimension == 0 {
            return Err(EmbeddingError::Failed("dimension must be positive".into()));
        }

        let mut acc = vec![0.0f64; self.dimension];
        let mut words = 0usize;
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            add_word(&mut acc, &word.to_lowercase());
            words += 1;
        }

        if words == 0 {
            return Err(EmbeddingError::Failed(
                "cannot embed text without words".into(),
            ));
        }

        let norm = acc.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm < 1e-12 {
            return Err(EmbeddingError::Failed("degenerate embedding".into()));
        }
        Ok(acc.into_iter().map(|x| (x / norm) as f32).collect())
    }
}

/// Add the word's direction: 8 components per SHA-256 block, each in [-1, 1].
fn add_word(acc: &mut [f64], word: &str) {
    let mut block = 0u32;
    let mut filled = 0;
    while filled < acc.len() {
        let mut hasher = Sha256::new();
        hasher.update(word.as_bytes());
        hasher.update(block.to_le_bytes());
        let digest = hasher.finalize();

        for chunk in digest.chunks_exact(4) {
            if filled == acc.len() {
                break;
            }
            let raw = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            acc[filled] += (raw as f64 / u32::MAX as f64) * 2.0 - 1.0;
            filled += 1;
        }
        block += 1;
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn name(&self) -> &str {
        "hash"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_sync(text)
    }
}
