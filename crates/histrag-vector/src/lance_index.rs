use async_trait::async_trait;
use lancedb::Table;

use histrag_core::error::{Error, Result};
use histrag_core::traits::VectorIndex;
use histrag_core::types::{Chunk, ChunkId, Neighbor};

use crate::manifest::IndexManifest;
use crate::{rank, table};

/// A loaded, read-only index: the LanceDB chunk table plus the chunk list and
/// manifest it was validated against.
pub struct LanceIndex {
    table: Table,
    manifest: IndexManifest,
    chunks: Vec<Chunk>,
}

impl LanceIndex {
    pub(crate) fn new(table: Table, manifest: IndexManifest, chunks: Vec<Chunk>) -> Self {
        Self { table, manifest, chunks }
    }

    pub fn chunks(&self) -> &[Chunk] { &self.chunks }
    pub fn manifest(&self) -> &IndexManifest { &self.manifest }
}

#[async_trait]
impl VectorIndex for LanceIndex {
    fn embedder_id(&self) -> &str { &self.manifest.embedder_id }
    fn len(&self) -> usize { self.chunks.len() }
    fn chunk(&self, id: ChunkId) -> Option<&Chunk> { self.chunks.get(id) }

    async fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        let k = k.min(self.chunks.len());
        if k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.manifest.dimension {
            return Err(Error::InvalidArgument(format!(
                "query vector has dimension {}, index expects {}",
                query.len(),
                self.manifest.dimension
            )));
        }
        let mut hits = table::search(&self.table, query, k).await?;
        rank(&mut hits);
        hits.truncate(k);
        Ok(hits)
    }
}
