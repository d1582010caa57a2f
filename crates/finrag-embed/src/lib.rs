//! Dense sentence embeddings for offline corpus preparation.
//!
//! Not used by the live retriever, which ranks with TF-IDF. Respects
//! `APP_USE_FAKE_EMBEDDINGS=1` to switch to a deterministic hashed embedder.
use anyhow::{Result, anyhow, ensure};
use std::path::{Path, PathBuf};

use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use indicatif::{ProgressBar, ProgressStyle};
use tokenizers::Tokenizer;
use tracing::info;

pub use finrag_core::traits::Embedder;

pub mod device;
pub mod flat_index;
pub mod pool;
pub mod tokenize;

pub use device::{accelerator, select_device};
pub use flat_index::FlatIpIndex;
pub use pool::masked_mean_l2;
pub use tokenize::tokenize_on_device;

pub const DEFAULT_EMBED_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
const MAX_LEN: usize = 256;

pub struct SentenceEmbedder { model: BertModel, tokenizer: Tokenizer, device: Device, dim: usize, pad_id: u32 }

impl SentenceEmbedder {
    pub fn new() -> Result<Self> {
        let model_dir = resolve_model_dir()?;
        Self::from_dir(&model_dir, select_device())
    }

    pub fn from_dir(model_dir: &Path, device: Device) -> Result<Self> {
        info!(dir = %model_dir.display(), "loading sentence embedding model");
        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let config: BertConfig = serde_json::from_str(&std::fs::read_to_string(model_dir.join("config.json"))?)?;
        let weights = candle_core::safetensors::load(model_dir.join("model.safetensors"), &device)?;
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
        let model = BertModel::load(vb, &config)?;
        let pad_id = tokenizer.token_to_id("[PAD]").unwrap_or(0);
        info!(dim = config.hidden_size, "sentence embedding model loaded");
        Ok(Self { model, tokenizer, device, dim: config.hidden_size, pad_id })
    }

    pub fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let (input_ids, attention_mask) = tokenize_on_device(&self.tokenizer, text, MAX_LEN, self.pad_id, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        Ok(pooled.to_device(&Device::Cpu)?.squeeze(0)?.to_dtype(DType::F32)?.to_vec1()?)
    }
}

impl Embedder for SentenceEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { MAX_LEN }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> { texts.iter().map(|t| self.embed_text(t)).collect() }
}

/// Hash-based embedder: deterministic, L2-normalised, no model files needed.
pub struct FakeEmbedder { dim: usize }

impl FakeEmbedder {
    pub fn new(dim: usize) -> Result<Self> {
        ensure!(dim > 0, "embedding dimension must be positive");
        Ok(Self { dim })
    }
}

impl Embedder for FakeEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { MAX_LEN }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        use std::hash::{Hash, Hasher}; use twox_hash::XxHash64;
        Ok(texts.iter().map(|text| {
            let mut v = vec![0f32; self.dim];
            for (i, token) in text.split_whitespace().enumerate() { let mut hasher = XxHash64::with_seed(0); token.to_lowercase().hash(&mut hasher); let h = hasher.finish(); let idx = (h as usize) % self.dim; let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32); v[idx] += val + (i as f32 % 3.0) * 0.01; }
            let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6); for x in &mut v { *x /= norm; } v
        }).collect())
    }
}

pub fn get_default_embedder() -> Result<Box<dyn Embedder>> {
    let use_fake = std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);
    if use_fake { info!("using FakeEmbedder"); return Ok(Box::new(FakeEmbedder::new(384)?)); }
    Ok(Box::new(SentenceEmbedder::new()?))
}

/// Embed `texts` one batch at a time with a progress bar. Returns one vector
/// per input, in order.
pub fn embed_texts(embedder: &dyn Embedder, texts: &[String], batch_size: usize) -> Result<Vec<Vec<f32>>> {
    let pb = ProgressBar::new(texts.len() as u64);
    pb.set_style(ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} texts {msg}")?.progress_chars("#>-"));
    let mut out = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size.max(1)) {
        let embs = embedder.embed_batch(batch)?;
        if embs.len() != batch.len() { return Err(anyhow!("embedder returned {} vectors for {} texts", embs.len(), batch.len())); }
        out.extend(embs);
        pb.inc(batch.len() as u64);
    }
    pb.finish_and_clear();
    Ok(out)
}

fn resolve_model_dir() -> Result<PathBuf> {
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) { let p = PathBuf::from(&dir); if p.exists() { info!(var, dir = %p.display(), "using local embedding model"); return Ok(p); } }
    }
    let local = Path::new("models/all-MiniLM-L6-v2"); if local.exists() { return Ok(local.to_path_buf()); }
    let repo = hf_hub::api::sync::Api::new()?.model(DEFAULT_EMBED_MODEL.to_string());
    let mut dir = None;
    for file in ["config.json", "tokenizer.json", "model.safetensors"] {
        let path = repo.get(file)?;
        dir = path.parent().map(Path::to_path_buf);
    }
    dir.ok_or_else(|| anyhow!("Could not locate embedding model directory"))
}
