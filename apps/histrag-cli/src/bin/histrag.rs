//! `histrag`: build the corpus index and answer questions from it.

use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use histrag_core::config::{resolve_with_base, Config, Settings};
use histrag_core::error::{Error, Result};
use histrag_core::traits::{Embedder, VectorIndex};
use histrag_core::types::Query;
use histrag_embed::embedder_from_settings;
use histrag_llm::GroundedAnswerer;
use histrag_rag::{preview, RagService};
use histrag_vector::{build_or_load, BuildOptions, LanceIndex};

#[derive(Parser)]
#[command(name = "histrag", version, about = "Grounded question answering over a historical corpus")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the index from the source document, or load and verify an existing one.
    Index(CorpusArgs),
    /// Answer a question from the indexed corpus.
    Ask {
        /// Question to ask; read from stdin when omitted.
        question: Option<String>,
        /// Number of chunks to retrieve (defaults to retrieval.top_n).
        #[arg(long, allow_negative_numbers = true)]
        top_n: Option<i64>,
        /// Print the response as JSON.
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        corpus: CorpusArgs,
    },
}

/// Overrides for the `[corpus]` paths.
#[derive(Args)]
struct CorpusArgs {
    #[arg(long)]
    document: Option<PathBuf>,
    #[arg(long)]
    index: Option<PathBuf>,
    #[arg(long)]
    chunks: Option<PathBuf>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

/// 2 is left to clap for usage errors.
fn exit_code(err: &Error) -> ExitCode {
    match err {
        Error::SourceNotFound(_) => ExitCode::from(4),
        Error::CorruptIndex(_) => ExitCode::from(3),
        _ => ExitCode::FAILURE,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "histrag failed");
            exit_code(&e)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let settings = Config::load()?.settings()?;
    match cli.command {
        Command::Index(corpus) => {
            let (index, embedder) = bootstrap(&settings, corpus).await?;
            println!("Index ready: {} chunks ({})", index.len(), embedder.id());
            Ok(())
        }
        Command::Ask { question, top_n, json, corpus } => {
            let generator = Arc::new(GroundedAnswerer::from_settings(&settings.generation)?);
            let question = match question {
                Some(q) => q,
                None => prompt_question()?,
            };
            let top_n = top_n.unwrap_or(i64::try_from(settings.retrieval.top_n).unwrap_or(i64::MAX));
            let query = Query::new(question, top_n)?;

            let (index, embedder) = bootstrap(&settings, corpus).await?;
            let service = RagService::new(Arc::new(index), embedder, generator)?;

            if !json {
                println!("\nRetrieving relevant chunks...");
            }
            let response = service.ask(query).await?;
            if json {
                let out = serde_json::to_string_pretty(&response).map_err(|e| Error::Operation(e.to_string()))?;
                println!("{out}");
            } else {
                println!("\nRetrieved Chunks:");
                for chunk in &response.retrieved_chunks {
                    println!("- \"{}\"", preview(chunk));
                }
                println!("\nLLM Response:");
                println!("\"{}\"", response.answer);
            }
            Ok(())
        }
    }
}

fn prompt_question() -> Result<String> {
    print!("User Query: ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    let question = line.trim().to_string();
    if question.is_empty() {
        return Err(Error::InvalidArgument("question must not be empty".into()));
    }
    Ok(question)
}

async fn bootstrap(settings: &Settings, corpus: CorpusArgs) -> Result<(LanceIndex, Arc<dyn Embedder>)> {
    let base = std::env::current_dir()?;
    let document = corpus.document.unwrap_or_else(|| resolve_with_base(&base, &settings.corpus.document_path));
    let index_path = corpus.index.unwrap_or_else(|| resolve_with_base(&base, &settings.corpus.index_path));
    let chunks_path = corpus.chunks.unwrap_or_else(|| resolve_with_base(&base, &settings.corpus.chunks_path));

    let embedder = embedder_from_settings(&settings.embedding, &base)?;
    info!(document = %document.display(), index = %index_path.display(), "preparing index");
    let index = build_or_load(
        &document,
        &index_path,
        &chunks_path,
        &BuildOptions::from_settings(settings),
        embedder.as_ref(),
    )
    .await?;
    Ok((index, embedder))
}
