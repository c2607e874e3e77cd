use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use histrag_core::build_context;
use histrag_core::error::Result;
use histrag_core::traits::{AnswerGenerator, Embedder, VectorIndex};
use histrag_core::types::{Query, QueryResponse};

use crate::retriever::Retriever;

/// Question answering over a loaded index: retrieve, assemble context, ask.
///
/// Holds only shared, read-only state, so one service can serve any number of
/// concurrent queries.
#[derive(Clone)]
pub struct RagService {
    retriever: Retriever,
    generator: Arc<dyn AnswerGenerator>,
}

impl RagService {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn AnswerGenerator>,
    ) -> Result<Self> {
        Ok(Self { retriever: Retriever::new(index, embedder)?, generator })
    }

    pub async fn ask(&self, query: Query) -> Result<QueryResponse> {
        let start = Instant::now();
        let retrieved = self.retriever.retrieve(&query.question, query.top_n).await?;
        let texts: Vec<String> = retrieved.into_iter().map(|r| r.chunk.text).collect();
        let context = build_context(&texts);
        let answer = self.generator.ask(&context, &query.question).await?;
        info!(
            top_n = query.top_n,
            retrieved = texts.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "answered query"
        );
        Ok(QueryResponse { question: query.question, retrieved_chunks: texts, answer })
    }
}

/// First sentence of a chunk, with `...` appended when the chunk contains a period.
pub fn preview(chunk: &str) -> String {
    let first = chunk.split(". ").next().unwrap_or_default();
    let suffix = if chunk.contains('.') { "..." } else { "" };
    format!("{first}{suffix}").trim().to_string()
}
