use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Chunk, ChunkId, Neighbor};

pub trait Embedder: Send + Sync {
    /// Stable identity of the model (e.g. `bert:sentence-transformers/all-MiniLM-L6-v2:d384`).
    /// Persisted with the index and compared on load.
    fn id(&self) -> &str;
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| crate::error::Error::Embedding("embedder returned no vector".into()))
    }
}

/// Read-only nearest-neighbour index over chunk vectors, together with the
/// chunk texts those vectors were computed from.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    fn embedder_id(&self) -> &str;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn chunk(&self, id: ChunkId) -> Option<&Chunk>;
    /// Up to `k` neighbours of `query`, closest first.
    async fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>>;
}

/// Answers a question from an assembled context block.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn ask(&self, context: &str, question: &str) -> Result<String>;
}

/// Raw text completion against an external language model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn name(&self) -> &str;
    async fn complete(&self, prompt: &str) -> Result<String>;
}
