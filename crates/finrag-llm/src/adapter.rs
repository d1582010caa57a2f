//! LoRA adapters merged directly into dense base weights.
//!
//! For every targeted linear layer the adapter ships `lora_A` (`[r, in]`) and
//! `lora_B` (`[out, r]`); merging applies `W += B·A · alpha / r` (or
//! `alpha / sqrt(r)` for rank-stabilised adapters).

use anyhow::{Context, Result, anyhow, ensure};
use candle_core::{DType, Tensor};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::source::ModelRepo;

const PEFT_PREFIX: &str = "base_model.model.";

#[derive(Debug, Clone, Deserialize)]
pub struct LoraConfig {
	pub r: usize,
	pub lora_alpha: f64,
	#[serde(default)]
	pub target_modules: Vec<String>,
	#[serde(default)]
	pub use_rslora: bool,
	#[serde(default)]
	pub base_model_name_or_path: Option<String>,
}

impl LoraConfig {
	pub fn scale(&self) -> f64 {
		if self.use_rslora { self.lora_alpha / (self.r as f64).sqrt() } else { self.lora_alpha / self.r as f64 }
	}
}

/// Outcome of the adapter step, reported alongside the loaded model.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AdapterStatus {
	/// The base weights already carried adapter tensors; used as-is.
	Embedded,
	Applied { rank: usize, alpha: f64, merged: usize },
	/// The base model is served unadapted.
	NotApplied { reason: String },
}

pub struct LoraAdapter {
	pub config: LoraConfig,
	tensors: HashMap<String, Tensor>,
}

impl LoraAdapter {
	pub fn fetch(repo: &ModelRepo) -> Result<Self> {
		let config: LoraConfig = repo.read_json("adapter_config.json")?;
		let path = repo.get("adapter_model.safetensors")?;
		let tensors = candle_core::safetensors::load(&path, &candle_core::Device::Cpu)
			.with_context(|| format!("reading {}", path.display()))?;
		Self::new(config, tensors)
	}

	pub fn new(config: LoraConfig, tensors: HashMap<String, Tensor>) -> Result<Self> {
		ensure!(config.r > 0, "adapter rank must be positive");
		Ok(Self { config, tensors })
	}

	/// Merge every `lora_A`/`lora_B` pair into `weights`, returning how many
	/// layers changed. Fails without touching `weights` when a pair is
	/// incomplete, targets a missing weight, or has mismatched shapes.
	pub fn merge_into(&self, weights: &mut HashMap<String, Tensor>) -> Result<usize> {
		let scale = self.config.scale();
		let mut updates = Vec::new();
		for (key, a) in &self.tensors {
			let Some(stem) = key.strip_suffix(".lora_A.weight") else { continue };
			let b_key = format!("{stem}.lora_B.weight");
			let b = self.tensors.get(&b_key).ok_or_else(|| anyhow!("missing {b_key}"))?;
			let target = format!("{}.weight", stem.strip_prefix(PEFT_PREFIX).unwrap_or(stem));
			let base = weights.get(&target).ok_or_else(|| anyhow!("adapter targets unknown weight {target}"))?;

			let delta = b.to_dtype(DType::F32)?.matmul(&a.to_dtype(DType::F32)?)?;
			ensure!(delta.dims() == base.dims(), "shape mismatch for {target}: base {:?}, delta {:?}", base.dims(), delta.dims());
			let merged = (base.to_dtype(DType::F32)? + (delta * scale)?.to_device(base.device())?)?.to_dtype(base.dtype())?;
			debug!(weight = %target, "merged lora delta");
			updates.push((target, merged));
		}
		ensure!(!updates.is_empty(), "adapter contains no lora_A/lora_B pairs");
		let merged = updates.len();
		weights.extend(updates);
		Ok(merged)
	}
}

/// Whether loaded weights already include adapter tensors.
pub fn carries_adapter(weights: &HashMap<String, Tensor>) -> bool {
	weights.keys().any(|k| k.contains(".lora_A.") || k.contains(".lora_B."))
}
