//! The three ways the model server gets a model into memory.

use anyhow::{Context, Result, anyhow, ensure};
use candle_core::quantized::{gguf_file, GgmlDType};
use candle_core::{DType, Device, Tensor};
use candle_transformers::models::llama::LlamaConfig;
use candle_transformers::models::quantized_llama::ModelWeights;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use finrag_embed::accelerator;

use crate::chain::LoadStrategy;
use crate::source::{ModelFiles, ModelRepo};

/// Weights produced by a strategy, before the adapter step.
pub enum BaseWeights {
    Dense { tensors: HashMap<String, Tensor>, config: LlamaConfig, dtype: DType, device: Device },
    Quantized { weights: ModelWeights, max_seq: usize, device: Device },
}

impl BaseWeights {
    pub fn device(&self) -> &Device {
        match self {
            BaseWeights::Dense { device, .. } | BaseWeights::Quantized { device, .. } => device,
        }
    }
}

#[derive(Deserialize)]
struct SafetensorsIndex {
    weight_map: HashMap<String, String>,
}

/// Read `config.json` and every safetensors shard, cast to `dtype`, place on `device`.
fn load_dense(repo: &ModelRepo, dtype: DType, device: &Device) -> Result<BaseWeights> {
    let config: LlamaConfig = repo.read_json("config.json")?;
    let shards: Vec<PathBuf> = if repo.has("model.safetensors.index.json") {
        let index: SafetensorsIndex = repo.read_json("model.safetensors.index.json")?;
        let names: BTreeSet<String> = index.weight_map.into_values().collect();
        names.iter().map(|n| repo.get(n)).collect::<Result<_>>()?
    } else {
        vec![repo.get("model.safetensors")?]
    };
    let mut tensors = HashMap::new();
    for shard in &shards {
        debug!(shard = %shard.display(), "reading weights");
        for (name, t) in candle_core::safetensors::load(shard, &Device::Cpu).with_context(|| format!("reading {}", shard.display()))? {
            let t = if t.dtype().is_float() { t.to_dtype(dtype)? } else { t };
            tensors.insert(name, t.to_device(device)?);
        }
    }
    ensure!(!tensors.is_empty(), "no tensors found in {}", repo.id());
    Ok(BaseWeights::Dense { tensors, config, dtype, device: device.clone() })
}

/// 4-bit GGUF weights, on the accelerator when there is one.
pub struct QuantizedStrategy {
    pub files: Arc<ModelFiles>,
    pub gguf_file: Option<String>,
}

impl QuantizedStrategy {
    fn locate(&self) -> Result<(String, PathBuf)> {
        for repo in self.files.search_order() {
            let name = match &self.gguf_file {
                Some(explicit) if repo.has(explicit) => Some(explicit.clone()),
                Some(_) => None,
                None => repo.files().ok().and_then(|files| pick_4bit_gguf(&files)),
            };
            if let Some(name) = name { return Ok((name.clone(), repo.get(&name)?)); }
        }
        Err(anyhow!("no 4-bit GGUF weights published for {}", self.files.repo.id()))
    }
}

/// First `.gguf` file whose name marks 4-bit quantization (`q4_0`, `Q4_K_M`, ...).
pub fn pick_4bit_gguf(files: &[String]) -> Option<String> {
    files.iter().find(|f| {
        let lower = f.to_lowercase();
        lower.ends_with(".gguf") && lower.contains("q4")
    }).cloned()
}

fn is_4bit(dtype: GgmlDType) -> bool {
    matches!(dtype, GgmlDType::Q4_0 | GgmlDType::Q4_1 | GgmlDType::Q4K)
}

impl LoadStrategy<BaseWeights> for QuantizedStrategy {
    fn name(&self) -> &'static str { "quantized-4bit" }

    fn load(&self) -> Result<BaseWeights> {
        let (name, path) = self.locate()?;
        info!(file = %name, "loading 4-bit GGUF weights");
        let mut file = std::fs::File::open(&path)?;
        let content = gguf_file::Content::read(&mut file).map_err(|e| e.with_path(&path))?;
        ensure!(content.tensor_infos.values().any(|t| is_4bit(t.ggml_dtype)), "{name} holds no 4-bit tensors");
        let max_seq = content
            .metadata
            .get("llama.context_length")
            .and_then(|v| v.to_u32().ok())
            .map_or(2048, |v| v as usize);
        let device = accelerator().unwrap_or(Device::Cpu);
        let weights = ModelWeights::from_gguf(content, &mut file, &device)?;
        Ok(BaseWeights::Quantized { weights, max_seq, device })
    }
}

/// Half precision on the GPU. The offload directory is created before loading.
pub struct GpuOffloadStrategy {
    pub files: Arc<ModelFiles>,
    pub offload_dir: PathBuf,
}

impl LoadStrategy<BaseWeights> for GpuOffloadStrategy {
    fn name(&self) -> &'static str { "gpu-offload" }

    fn skip_reason(&self) -> Option<String> {
        accelerator().is_none().then(|| "no GPU device detected".to_string())
    }

    fn load(&self) -> Result<BaseWeights> {
        let device = accelerator().ok_or_else(|| anyhow!("GPU device disappeared"))?;
        std::fs::create_dir_all(&self.offload_dir)
            .with_context(|| format!("creating offload dir {}", self.offload_dir.display()))?;
        info!(offload_dir = %self.offload_dir.display(), "loading f16 weights on GPU");
        load_dense(self.files.weights_repo(), DType::F16, &device)
    }
}

/// Full precision on CPU; the last resort.
pub struct CpuStrategy {
    pub files: Arc<ModelFiles>,
}

impl LoadStrategy<BaseWeights> for CpuStrategy {
    fn name(&self) -> &'static str { "cpu" }

    fn load(&self) -> Result<BaseWeights> {
        info!("falling back to CPU-only load (slow)");
        load_dense(self.files.weights_repo(), DType::F32, &Device::Cpu)
    }
}
