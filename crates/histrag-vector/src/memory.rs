//! Brute-force in-memory index. Same ranking as the persisted index, no disk.

use async_trait::async_trait;

use histrag_core::error::{Error, Result};
use histrag_core::traits::{Embedder, VectorIndex};
use histrag_core::types::{Chunk, ChunkId, Neighbor};

use crate::rank;

#[derive(Debug, Clone)]
pub struct FlatIndex {
    embedder_id: String,
    chunks: Vec<Chunk>,
    vectors: Vec<Vec<f32>>,
}

/// Squared Euclidean distance, matching LanceDB's `l2`.
fn l2_squared(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

impl FlatIndex {
    pub fn new(embedder_id: impl Into<String>, chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<Self> {
        if chunks.len() != vectors.len() {
            return Err(Error::InvalidArgument(format!(
                "{} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }
        Ok(Self { embedder_id: embedder_id.into(), chunks, vectors })
    }

    pub fn build(chunks: Vec<Chunk>, embedder: &dyn Embedder) -> Result<Self> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = if texts.is_empty() { Vec::new() } else { embedder.embed_batch(&texts)? };
        Self::new(embedder.id(), chunks, vectors)
    }
}

#[async_trait]
impl VectorIndex for FlatIndex {
    fn embedder_id(&self) -> &str { &self.embedder_id }
    fn len(&self) -> usize { self.chunks.len() }
    fn chunk(&self, id: ChunkId) -> Option<&Chunk> { self.chunks.get(id) }

    async fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        let mut scored: Vec<Neighbor> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(id, v)| Neighbor { id, distance: l2_squared(v, query) })
            .collect();
        rank(&mut scored);
        scored.truncate(k);
        Ok(scored)
    }
}
