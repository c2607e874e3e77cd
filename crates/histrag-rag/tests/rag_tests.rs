use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use histrag_core::traits::{AnswerGenerator, LanguageModel, VectorIndex};
use histrag_core::types::{Chunk, Query};
use histrag_core::{Error, RecursiveChunker};
use histrag_embed::FakeEmbedder;
use histrag_llm::{GroundedAnswerer, PromptTemplate, RetryPolicy, FALLBACK_ANSWER};
use histrag_rag::{RagService, Retriever};
use histrag_vector::{build_or_load, BuildOptions, FlatIndex};

const CORPUS: &str = "José Rizal was born on June 19, 1861 in Calamba, Laguna. He became the national hero of the Philippines.\n\n\
The Katipunan was founded on July 7, 1892 by Andrés Bonifacio to win independence from Spain.\n\n\
The Philippine Declaration of Independence was proclaimed on June 12, 1898 in Kawit, Cavite.\n\n\
The galleon trade linked Manila and Acapulco for two and a half centuries.\n\n\
The Battle of Mactan was fought on April 27, 1521, when Lapulapu defeated Ferdinand Magellan.";

/// Records the prompt and answers from it the way a well-behaved model would.
struct ScriptedModel {
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }
    async fn complete(&self, prompt: &str) -> histrag_core::Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if prompt.contains("June 19, 1861") {
            Ok(" José Rizal was born on June 19, 1861, and became the national hero of the Philippines.\n".into())
        } else {
            Ok(FALLBACK_ANSWER.into())
        }
    }
}

/// Returns the fallback for an empty context, otherwise echoes the context size.
struct EchoGenerator;

#[async_trait]
impl AnswerGenerator for EchoGenerator {
    async fn ask(&self, context: &str, _question: &str) -> histrag_core::Result<String> {
        if context.is_empty() {
            Ok(FALLBACK_ANSWER.to_string())
        } else {
            Ok(format!("{} context lines", context.lines().filter(|l| l.starts_with("- \"")).count()))
        }
    }
}

struct FailingGenerator;

#[async_trait]
impl AnswerGenerator for FailingGenerator {
    async fn ask(&self, _context: &str, _question: &str) -> histrag_core::Result<String> {
        Err(Error::generation("503 service unavailable", true))
    }
}

fn flat_index(embedder: &FakeEmbedder) -> Arc<dyn VectorIndex> {
    let chunker = RecursiveChunker::new(200, 20).unwrap();
    let chunks = Chunk::from_texts(chunker.split(CORPUS));
    Arc::new(FlatIndex::build(chunks, embedder).unwrap())
}

#[tokio::test]
async fn jose_rizal_question_end_to_end() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let doc = dir.path().join("philippine_history.txt");
    std::fs::write(&doc, CORPUS)?;
    let embedder = Arc::new(FakeEmbedder::new(256));
    let options = BuildOptions { chunk_size: 200, chunk_overlap: 20, batch_size: 4, lock_timeout: Duration::from_secs(30) };
    let index = build_or_load(&doc, &dir.path().join("index"), &dir.path().join("chunks.json"), &options, embedder.as_ref()).await?;

    let model = ScriptedModel { prompts: Mutex::new(Vec::new()) };
    let answerer = Arc::new(GroundedAnswerer::new(
        model,
        PromptTemplate::new("You are a helpful Philippine history expert."),
        RetryPolicy::none(),
    ));
    let service = RagService::new(Arc::new(index), embedder, answerer)?;

    let response = service.ask(Query::new("When was José Rizal born?", 3)?).await?;
    assert_eq!(response.question, "When was José Rizal born?");
    assert_eq!(response.retrieved_chunks.len(), 3);
    assert!(response.retrieved_chunks[0].contains("José Rizal was born"), "{:?}", response.retrieved_chunks);
    assert!(response.answer.contains("1861"));
    assert!(response.answer.contains("national hero"));
    assert!(!response.answer.ends_with('\n'));

    let json = serde_json::to_value(&response)?;
    assert_eq!(json["llm_response"], response.answer.as_str());

    let who = "Who is José Rizal and why is he important?";
    let response = service.ask(Query::new(who, 3)?).await?;
    assert_eq!(response.question, who);
    assert!(
        response.retrieved_chunks.iter().any(|c| c.contains("José Rizal") && c.contains("national hero")),
        "{:?}",
        response.retrieved_chunks
    );
    assert!(response.answer.contains("José Rizal"));
    assert!(response.answer.contains("national hero"));
    assert_ne!(response.answer, FALLBACK_ANSWER);
    Ok(())
}

#[tokio::test]
async fn empty_index_falls_back_without_calling_search() -> anyhow::Result<()> {
    let embedder = Arc::new(FakeEmbedder::new(32));
    let index = Arc::new(FlatIndex::build(Vec::new(), embedder.as_ref())?);
    let service = RagService::new(index, embedder, Arc::new(EchoGenerator))?;

    let response = service.ask(Query::new("Who was Lapulapu?", 5)?).await?;
    assert!(response.retrieved_chunks.is_empty());
    assert_eq!(response.answer, FALLBACK_ANSWER);
    Ok(())
}

#[tokio::test]
async fn zero_top_n_is_invalid() {
    let embedder = Arc::new(FakeEmbedder::new(32));
    let retriever = Retriever::new(flat_index(&embedder), embedder.clone()).unwrap();
    let err = retriever.retrieve("Rizal", 0).await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));

    let service = RagService::new(flat_index(&embedder), embedder, Arc::new(EchoGenerator)).unwrap();
    let err = service.ask(Query { question: "Rizal".into(), top_n: 0 }).await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[tokio::test]
async fn huge_top_n_returns_every_chunk_in_distance_order() -> anyhow::Result<()> {
    let embedder = Arc::new(FakeEmbedder::new(64));
    let index = flat_index(&embedder);
    let total = index.len();
    let retriever = Retriever::new(index, embedder)?;

    let hits = retriever.retrieve("When did the Katipunan form?", 1_000_000_000).await?;
    assert_eq!(hits.len(), total);
    assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
    let mut ids: Vec<_> = hits.iter().map(|h| h.chunk.id).collect();
    ids.sort_unstable();
    assert_eq!(ids, (0..total).collect::<Vec<_>>());
    Ok(())
}

#[test]
fn index_from_another_embedder_is_refused() {
    let built_with = FakeEmbedder::new(32);
    let err = Retriever::new(flat_index(&built_with), Arc::new(FakeEmbedder::new(64))).err();
    assert!(matches!(err, Some(Error::CorruptIndex(_))));
}

#[tokio::test]
async fn concurrent_queries_share_one_index() -> anyhow::Result<()> {
    let embedder = Arc::new(FakeEmbedder::new(64));
    let service = RagService::new(flat_index(&embedder), embedder, Arc::new(EchoGenerator))?;

    let questions = ["Rizal", "Katipunan", "Mactan", "galleon trade", "independence", "Bonifacio"];
    let tasks = questions.iter().map(|q| {
        let service = service.clone();
        let q = q.to_string();
        tokio::spawn(async move { service.ask(Query::new(q, 2)?).await })
    });
    for result in futures::future::join_all(tasks).await {
        let response = result??;
        assert_eq!(response.retrieved_chunks.len(), 2);
        assert_eq!(response.answer, "2 context lines");
    }
    Ok(())
}

#[tokio::test]
async fn generation_failure_fails_only_that_query() -> anyhow::Result<()> {
    let embedder = Arc::new(FakeEmbedder::new(32));
    let index = flat_index(&embedder);
    let failing = RagService::new(index.clone(), embedder.clone(), Arc::new(FailingGenerator))?;
    let err = failing.ask(Query::new("Rizal", 2)?).await.unwrap_err();
    assert!(matches!(err, Error::Generation { .. }));

    let healthy = RagService::new(index, embedder, Arc::new(EchoGenerator))?;
    assert_eq!(healthy.ask(Query::new("Rizal", 2)?).await?.retrieved_chunks.len(), 2);
    Ok(())
}
