//! Build-or-load of the persisted index.
//!
//! Layout: `index_path/` holds the LanceDB dataset and `manifest.json`;
//! `chunks_path` holds the chunk texts as a JSON array. A build writes both
//! into temporary siblings, moves the chunk file into place, then the index
//! directory last. The manifest's digest ties the two together, so a crash
//! mid-build never leaves a pair that loads.

use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use histrag_core::config::Settings;
use histrag_core::error::{Error, Result};
use histrag_core::source::load_document;
use histrag_core::traits::Embedder;
use histrag_core::types::Chunk;
use histrag_core::RecursiveChunker;

use crate::lance_index::LanceIndex;
use crate::lock::BuildLock;
use crate::manifest::{decode_chunks, digest, encode_chunks, IndexManifest};
use crate::table;

#[derive(Debug, Clone, PartialEq)]
pub struct BuildOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Chunks per embedding call and per LanceDB record batch.
    pub batch_size: usize,
    pub lock_timeout: Duration,
}

impl BuildOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            chunk_size: settings.chunking.chunk_size,
            chunk_overlap: settings.chunking.chunk_overlap,
            batch_size: settings.build.batch_size,
            lock_timeout: Duration::from_secs(settings.build.lock_timeout_secs),
        }
    }
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

fn artifacts_exist(index_path: &Path, chunks_path: &Path) -> bool {
    index_path.is_dir() && chunks_path.is_file()
}

/// Load the index persisted at `index_path` / `chunks_path`, or build it from
/// `document_path` when either artifact is missing.
pub async fn build_or_load(
    document_path: &Path,
    index_path: &Path,
    chunks_path: &Path,
    options: &BuildOptions,
    embedder: &dyn Embedder,
) -> Result<LanceIndex> {
    let lock_path = BuildLock::path_for(index_path);
    loop {
        if artifacts_exist(index_path, chunks_path) {
            return load(index_path, chunks_path, embedder).await;
        }
        if !document_path.is_file() {
            return Err(Error::SourceNotFound(document_path.to_path_buf()));
        }
        match BuildLock::try_acquire(&lock_path)? {
            Some(lock) => {
                // Another process may have finished between our check and the lock.
                if artifacts_exist(index_path, chunks_path) {
                    drop(lock);
                    continue;
                }
                let result = build(document_path, index_path, chunks_path, options, embedder, &lock).await;
                drop(lock);
                result?;
                return load(index_path, chunks_path, embedder).await;
            }
            None => BuildLock::wait_released(&lock_path, options.lock_timeout).await?,
        }
    }
}

/// Validate and open a persisted index. Any unreadable or inconsistent artifact is `CorruptIndex`.
pub async fn load(index_path: &Path, chunks_path: &Path, embedder: &dyn Embedder) -> Result<LanceIndex> {
    let manifest = IndexManifest::read(index_path)?;
    let bytes = std::fs::read(chunks_path)
        .map_err(|e| Error::CorruptIndex(format!("cannot read {}: {e}", chunks_path.display())))?;
    if digest(&bytes) != manifest.chunks_digest {
        return Err(Error::CorruptIndex(format!(
            "{} does not match the digest recorded in the index manifest",
            chunks_path.display()
        )));
    }
    let chunks = decode_chunks(&bytes)?;
    if chunks.len() != manifest.chunk_count {
        return Err(Error::CorruptIndex(format!(
            "manifest lists {} chunks, chunk file has {}",
            manifest.chunk_count,
            chunks.len()
        )));
    }
    if manifest.embedder_id != embedder.id() {
        return Err(Error::CorruptIndex(format!(
            "index was built with embedder '{}', current embedder is '{}'",
            manifest.embedder_id,
            embedder.id()
        )));
    }
    if manifest.dimension != embedder.dim() {
        return Err(Error::CorruptIndex(format!(
            "index dimension {} does not match embedder dimension {}",
            manifest.dimension,
            embedder.dim()
        )));
    }

    let corrupt = |e: Error| Error::CorruptIndex(e.to_string());
    let conn = table::open_db(index_path).await.map_err(corrupt)?;
    let chunk_table = table::open_chunk_table(&conn).await.map_err(corrupt)?;
    let rows = chunk_table
        .count_rows(None)
        .await
        .map_err(|e| Error::CorruptIndex(e.to_string()))?;
    if rows != manifest.chunk_count {
        return Err(Error::CorruptIndex(format!(
            "vector table has {rows} rows, expected {}",
            manifest.chunk_count
        )));
    }

    info!(index = %index_path.display(), chunks = chunks.len(), embedder = %manifest.embedder_id, "loaded index");
    Ok(LanceIndex::new(chunk_table, manifest, chunks))
}

fn parent_or_cwd(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

fn embed_chunks(
    chunks: &[Chunk],
    embedder: &dyn Embedder,
    batch_size: usize,
    lock: &BuildLock,
) -> Result<Vec<Vec<f32>>> {
    let pb = progress_bar(chunks.len());
    let mut vectors = Vec::with_capacity(chunks.len());
    for batch in chunks.chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let embedded = embedder.embed_batch(&texts)?;
        if embedded.len() != texts.len() {
            return Err(Error::Embedding(format!("asked for {} vectors, got {}", texts.len(), embedded.len())));
        }
        if let Some(bad) = embedded.iter().find(|v| v.len() != embedder.dim()) {
            return Err(Error::Embedding(format!(
                "embedder returned dimension {}, declared {}",
                bad.len(),
                embedder.dim()
            )));
        }
        vectors.extend(embedded);
        pb.inc(batch.len() as u64);
        lock.refresh()?;
    }
    pb.finish_with_message("embedded");
    Ok(vectors)
}

async fn build(
    document_path: &Path,
    index_path: &Path,
    chunks_path: &Path,
    options: &BuildOptions,
    embedder: &dyn Embedder,
    lock: &BuildLock,
) -> Result<()> {
    let start = Instant::now();
    let chunker = RecursiveChunker::new(options.chunk_size, options.chunk_overlap)?;
    let text = load_document(document_path)?;
    let chunks = Chunk::from_texts(chunker.split(&text));
    info!(source = %document_path.display(), chunks = chunks.len(), "building index");

    let vectors = embed_chunks(&chunks, embedder, options.batch_size, lock)?;

    let chunk_bytes = encode_chunks(&chunks)?;
    let chunks_digest = digest(&chunk_bytes);
    let chunks_dir = parent_or_cwd(chunks_path);
    std::fs::create_dir_all(chunks_dir)?;
    let mut chunk_file = tempfile::NamedTempFile::new_in(chunks_dir)?;
    chunk_file.write_all(&chunk_bytes)?;
    chunk_file.as_file().sync_all()?;

    let index_dir = parent_or_cwd(index_path);
    std::fs::create_dir_all(index_dir)?;
    let staging = tempfile::Builder::new().prefix(".histrag-index-").tempdir_in(index_dir)?;
    {
        let conn = table::open_db(staging.path()).await?;
        table::create_chunk_table(&conn, &vectors, embedder.dim(), options.batch_size).await?;
    }
    IndexManifest::new(embedder.id(), embedder.dim(), chunks.len(), chunks_digest).write(staging.path())?;
    debug!(staging = %staging.path().display(), "staged index");

    // Only the current lock holder may publish.
    lock.refresh()?;

    chunk_file.persist(chunks_path).map_err(|e| Error::Io(e.error))?;
    if index_path.exists() {
        // Leftover from an interrupted build; it never had a matching chunk file.
        std::fs::remove_dir_all(index_path)?;
    }
    std::fs::rename(staging.path(), index_path)?;

    info!(
        index = %index_path.display(),
        chunks = chunks.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "index built"
    );
    Ok(())
}
