use anyhow::{Result, anyhow};
use candle_nn::VarBuilder;
use candle_transformers::models::llama::Llama;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokenizers::Tokenizer;
use tracing::{info, warn};

use finrag_core::config::ModelServerSettings;

use crate::adapter::{carries_adapter, AdapterStatus, LoraAdapter};
use crate::chain::{Attempt, FallbackChain, LoadStrategy};
use crate::model::{CausalLm, LlamaLm, QuantizedLm};
use crate::source::{ModelFiles, ModelRepo};
use crate::strategy::{BaseWeights, CpuStrategy, GpuOffloadStrategy, QuantizedStrategy};

/// How the model server's model was obtained.
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub model_id: String,
    pub strategy: &'static str,
    pub device: String,
    pub attempts: Vec<Attempt>,
    pub adapter: AdapterStatus,
}

/// The loaded (tokenizer, model) pair. Inference only; built once at startup.
pub struct ModelHandle {
    pub tokenizer: Tokenizer,
    pub model: Box<dyn CausalLm>,
    pub report: LoadReport,
}

pub struct LoadOptions {
    pub model_id: String,
    pub revision: String,
    pub offload_dir: PathBuf,
    pub gguf_file: Option<String>,
}

impl From<&ModelServerSettings> for LoadOptions {
    fn from(s: &ModelServerSettings) -> Self {
        Self { model_id: s.model_id.clone(), revision: s.revision.clone(), offload_dir: s.offload_dir.clone(), gguf_file: s.gguf_file.clone() }
    }
}

/// The default chain: quantized, then GPU with offload, then CPU.
pub fn default_strategies(files: &Arc<ModelFiles>, opts: &LoadOptions) -> Vec<Box<dyn LoadStrategy<BaseWeights>>> {
    vec![
        Box::new(QuantizedStrategy { files: files.clone(), gguf_file: opts.gguf_file.clone() }),
        Box::new(GpuOffloadStrategy { files: files.clone(), offload_dir: opts.offload_dir.clone() }),
        Box::new(CpuStrategy { files: files.clone() }),
    ]
}

/// Resolve the model, run the fallback chain, apply the adapter and return a
/// ready handle. Fails only when every strategy failed.
pub fn load_model(opts: &LoadOptions) -> Result<ModelHandle> {
    info!(model_id = %opts.model_id, "loading tokenizer");
    let files = Arc::new(ModelFiles::resolve(&opts.model_id, &opts.revision)?);
    let tokenizer = Tokenizer::from_file(&files.tokenizer).map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", files.tokenizer.display(), e))?;
    let chain = FallbackChain::new(default_strategies(&files, opts));
    let (model, report) = load_with_chain(&opts.model_id, &chain, |base| apply_adapter(base, &files.repo))?;
    Ok(ModelHandle { tokenizer, model, report })
}

/// Run `chain`, pass the winner through `adapt`, and build the model.
pub fn load_with_chain<F>(model_id: &str, chain: &FallbackChain<BaseWeights>, adapt: F) -> Result<(Box<dyn CausalLm>, LoadReport)>
where
    F: FnOnce(BaseWeights) -> (BaseWeights, AdapterStatus),
{
    let (base, attempts) = chain.run()?;
    let strategy = attempts.last().map_or("unknown", |a| a.strategy);
    let (base, adapter) = adapt(base);
    let device = format!("{:?}", base.device());
    let model = build(base)?;
    let report = LoadReport { model_id: model_id.to_string(), strategy, device, attempts, adapter };
    info!(strategy, adapter = ?report.adapter, "model ready for inference");
    Ok((model, report))
}

/// Best-effort adapter step: never fails, reports what happened instead.
pub fn apply_adapter(base: BaseWeights, adapter_repo: &ModelRepo) -> (BaseWeights, AdapterStatus) {
    match base {
        BaseWeights::Dense { mut tensors, config, dtype, device } => {
            if carries_adapter(&tensors) {
                return (BaseWeights::Dense { tensors, config, dtype, device }, AdapterStatus::Embedded);
            }
            let status = match LoraAdapter::fetch(adapter_repo).and_then(|a| a.merge_into(&mut tensors).map(|n| (a, n))) {
                Ok((a, merged)) => {
                    info!(rank = a.config.r, merged, "lora adapter merged");
                    AdapterStatus::Applied { rank: a.config.r, alpha: a.config.lora_alpha, merged }
                }
                Err(e) => {
                    warn!(error = %format!("{e:#}"), "adapter not applied, serving base model");
                    AdapterStatus::NotApplied { reason: format!("{e:#}") }
                }
            };
            (BaseWeights::Dense { tensors, config, dtype, device }, status)
        }
        quantized @ BaseWeights::Quantized { .. } => {
            let reason = "adapters cannot be merged into quantized weights".to_string();
            warn!(%reason, "adapter not applied, serving base model");
            (quantized, AdapterStatus::NotApplied { reason })
        }
    }
}

fn build(base: BaseWeights) -> Result<Box<dyn CausalLm>> {
    match base {
        BaseWeights::Dense { tensors, config, dtype, device } => {
            let config = config.into_config(false);
            let vb = VarBuilder::from_tensors(tensors, dtype, &device);
            let model = Llama::load(vb, &config)?;
            Ok(Box::new(LlamaLm::new(model, config, dtype, device)))
        }
        BaseWeights::Quantized { weights, max_seq, device } => Ok(Box::new(QuantizedLm::new(weights, max_seq, device))),
    }
}
