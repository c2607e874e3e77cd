//! On-disk description of a built index and the chunk list it belongs to.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;

use histrag_core::error::{Error, Result};
use histrag_core::types::Chunk;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const FORMAT_VERSION: u32 = 1;
pub const DISTANCE_L2: &str = "l2";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub format_version: u32,
    pub embedder_id: String,
    pub dimension: usize,
    pub distance: String,
    pub chunk_count: usize,
    /// blake3 hex digest of the chunk file bytes.
    pub chunks_digest: String,
    pub created_at: String,
}

impl IndexManifest {
    pub fn new(embedder_id: &str, dimension: usize, chunk_count: usize, chunks_digest: String) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            embedder_id: embedder_id.to_string(),
            dimension,
            distance: DISTANCE_L2.to_string(),
            chunk_count,
            chunks_digest,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    pub fn read(index_dir: &Path) -> Result<Self> {
        let path = index_dir.join(MANIFEST_FILE);
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| Error::CorruptIndex(format!("cannot read {}: {e}", path.display())))?;
        let manifest: Self = serde_json::from_str(&raw)
            .map_err(|e| Error::CorruptIndex(format!("malformed {}: {e}", path.display())))?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(Error::CorruptIndex(format!(
                "unsupported index format version {} (expected {FORMAT_VERSION})",
                manifest.format_version
            )));
        }
        if manifest.distance != DISTANCE_L2 {
            return Err(Error::CorruptIndex(format!("unsupported distance '{}'", manifest.distance)));
        }
        Ok(manifest)
    }

    pub fn write(&self, index_dir: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(self).map_err(|e| Error::Operation(e.to_string()))?;
        std::fs::write(index_dir.join(MANIFEST_FILE), raw)?;
        Ok(())
    }
}

/// Serialize a chunk list as a JSON array of its texts, in id order.
pub fn encode_chunks(chunks: &[Chunk]) -> Result<Vec<u8>> {
    let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
    serde_json::to_vec(&texts).map_err(|e| Error::Operation(e.to_string()))
}

pub fn decode_chunks(bytes: &[u8]) -> Result<Vec<Chunk>> {
    let texts: Vec<String> =
        serde_json::from_slice(bytes).map_err(|e| Error::CorruptIndex(format!("malformed chunk list: {e}")))?;
    Ok(Chunk::from_texts(texts))
}

pub fn digest(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}
