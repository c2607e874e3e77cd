//! Sentence embedders for chunk and query text.
//!
//! `BertEmbedder` runs a sentence-transformers BERT checkpoint locally with
//! candle (mean pooling + L2 normalisation). `FakeEmbedder` hashes tokens into
//! a fixed-size vector; it is deterministic and needs no model files, which
//! makes it the embedder of choice for tests and offline development.

pub mod device;
pub mod pool;
pub mod tokenize;

use anyhow::{anyhow, Context};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use histrag_core::config::EmbeddingSettings;
use histrag_core::error::{Error, Result};
use histrag_core::traits::Embedder;

pub use device::select_device;
pub use pool::masked_mean_l2;

const FORWARD_BATCH: usize = 16;

pub struct BertEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    id: String,
    dim: usize,
    max_len: usize,
    pad_id: u32,
}

impl BertEmbedder {
    pub fn load(model_id: &str, model_dir: &Path, max_len: usize) -> anyhow::Result<Self> {
        let device = select_device();
        info!(model = model_id, dir = %model_dir.display(), "loading embedding model");

        let tokenizer_path = model_dir.join("tokenizer.json");
        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        tokenize::limit_length(&mut tokenizer, max_len)?;

        let config_path = model_dir.join("config.json");
        let config: BertConfig = serde_json::from_str(
            &std::fs::read_to_string(&config_path)
                .with_context(|| format!("reading {}", config_path.display()))?,
        )?;

        let weights = load_weights(model_dir, &device)?;
        let vb = VarBuilder::from_tensors(weights, DTYPE, &device);
        let model = BertModel::load(vb, &config)?;

        let dim = config.hidden_size;
        let pad_id = u32::try_from(config.pad_token_id)?;
        info!(model = model_id, dim, "embedding model loaded");
        Ok(Self { model, tokenizer, device, id: format!("bert:{model_id}:d{dim}"), dim, max_len, pad_id })
    }

    fn forward(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let batch = tokenize::tokenize_batch(&self.tokenizer, texts, self.pad_id, &self.device)?;
        let hidden = self
            .model
            .forward(&batch.input_ids, &batch.token_type_ids, Some(&batch.attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &batch.attention_mask)?;
        Ok(pooled.to_device(&Device::Cpu)?.to_vec2::<f32>()?)
    }
}

fn load_weights(model_dir: &Path, device: &Device) -> anyhow::Result<HashMap<String, Tensor>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        return Ok(candle_core::safetensors::load(&safetensors, device)?);
    }
    let pickle = model_dir.join("pytorch_model.bin");
    if pickle.exists() {
        return Ok(candle_core::pickle::read_all(&pickle)?.into_iter().collect());
    }
    Err(anyhow!("no model.safetensors or pytorch_model.bin in {}", model_dir.display()))
}

impl Embedder for BertEmbedder {
    fn id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { self.max_len }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(FORWARD_BATCH) {
            out.extend(self.forward(batch).map_err(|e| Error::Embedding(e.to_string()))?);
        }
        debug!(count = texts.len(), elapsed_ms = start.elapsed().as_millis() as u64, "embedded batch");
        Ok(out)
    }
}

/// Bag-of-hashed-tokens embedder. Same text, same vector; shared tokens pull
/// vectors together, which is enough for retrieval tests.
pub struct FakeEmbedder { id: String, dim: usize }

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self { Self { id: format!("fake:xxh64:d{dim}"), dim } }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let token = token.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
            if token.is_empty() { continue; }
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += 0.5 + val + (i as f32 % 3.0) * 0.01;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v { *x /= norm; }
        v
    }
}

impl Embedder for FakeEmbedder {
    fn id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { usize::MAX }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Build the embedder the settings ask for. Relative model dirs resolve against `base`.
pub fn embedder_from_settings(settings: &EmbeddingSettings, base: &Path) -> Result<Arc<dyn Embedder>> {
    if settings.use_fake {
        if settings.fake_dim == 0 {
            return Err(Error::InvalidConfig("embedding.fake_dim must be greater than zero".into()));
        }
        info!(dim = settings.fake_dim, "using FakeEmbedder");
        return Ok(Arc::new(FakeEmbedder::new(settings.fake_dim)));
    }
    let model_dir = resolve_model_dir(settings, base)?;
    let embedder = BertEmbedder::load(&settings.model_id, &model_dir, settings.max_len)
        .map_err(|e| Error::Embedding(format!("failed to load {}: {e:#}", settings.model_id)))?;
    Ok(Arc::new(embedder))
}

fn resolve_model_dir(settings: &EmbeddingSettings, base: &Path) -> Result<PathBuf> {
    let configured = histrag_core::config::resolve_with_base(base, &settings.model_dir);
    if configured.exists() {
        return Ok(configured);
    }
    if let Ok(dir) = std::env::var("MODEL_DIR") {
        let p = PathBuf::from(&dir);
        if p.exists() {
            debug!(dir = %p.display(), "using MODEL_DIR");
            return Ok(p);
        }
    }
    Err(Error::InvalidConfig(format!(
        "embedding model directory {} does not exist (set embedding.model_dir or MODEL_DIR)",
        configured.display()
    )))
}
