use std::sync::Arc;
use tracing::debug;

use histrag_core::error::{Error, Result};
use histrag_core::traits::{Embedder, VectorIndex};
use histrag_core::types::RetrievedChunk;

/// Embeds a question and looks up its nearest chunks.
#[derive(Clone)]
pub struct Retriever {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
}

impl Retriever {
    /// Fails with `CorruptIndex` when the index was built by a different embedder.
    pub fn new(index: Arc<dyn VectorIndex>, embedder: Arc<dyn Embedder>) -> Result<Self> {
        if index.embedder_id() != embedder.id() {
            return Err(Error::CorruptIndex(format!(
                "index was built with embedder '{}', queries would use '{}'",
                index.embedder_id(),
                embedder.id()
            )));
        }
        Ok(Self { index, embedder })
    }

    /// Up to `top_n` chunks, closest first.
    pub async fn retrieve(&self, query_text: &str, top_n: usize) -> Result<Vec<RetrievedChunk>> {
        if top_n == 0 {
            return Err(Error::InvalidArgument("top_n must be positive, got 0".into()));
        }
        if self.index.is_empty() {
            debug!("index is empty; nothing to retrieve");
            return Ok(Vec::new());
        }
        let k = top_n.min(self.index.len());
        let query = self.embedder.embed(query_text)?;
        let neighbors = self.index.nearest(&query, k).await?;
        neighbors
            .into_iter()
            .map(|n| {
                let chunk = self
                    .index
                    .chunk(n.id)
                    .ok_or_else(|| Error::CorruptIndex(format!("vector id {} has no chunk", n.id)))?;
                Ok(RetrievedChunk { chunk: chunk.clone(), distance: n.distance })
            })
            .collect()
    }
}
