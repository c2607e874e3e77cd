//! Domain types shared by the index, retriever and query service.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Ordinal position of a chunk within the source document.
pub type ChunkId = usize;

/// A segment of the source document that is embedded and retrieved on its own.
///
/// `id` is the chunk's position in the persisted chunk list; the vector index
/// stores the same id next to the chunk's embedding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub text: String,
}

impl Chunk {
    /// Number the texts in order, producing the chunk list of a document.
    pub fn from_texts<I, S>(texts: I) -> Vec<Chunk>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        texts.into_iter().enumerate().map(|(id, text)| Chunk { id, text: text.into() }).collect()
    }
}

/// A stored vector close to a query vector. Lower distance is closer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub id: ChunkId,
    pub distance: f32,
}

/// One entry of a retrieval result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    pub distance: f32,
}

/// A question plus the number of chunks to retrieve for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub question: String,
    pub top_n: usize,
}

impl Query {
    /// Validate an untrusted top-N (it may come straight off a request body).
    pub fn new(question: impl Into<String>, top_n: i64) -> Result<Self> {
        if top_n <= 0 {
            return Err(Error::InvalidArgument(format!("top_n must be positive, got {top_n}")));
        }
        let top_n = usize::try_from(top_n)
            .map_err(|_| Error::InvalidArgument(format!("top_n {top_n} does not fit in usize")))?;
        Ok(Self { question: question.into(), top_n })
    }
}

/// What a query returns to its caller: the echoed question, the retrieved
/// chunk texts in rank order, and the generated answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub question: String,
    pub retrieved_chunks: Vec<String>,
    #[serde(rename = "llm_response")]
    pub answer: String,
}
