//! Causal language models behind a single greedy-decoding interface.

use anyhow::Result;
use candle_core::{DType, Device, Tensor};
use candle_transformers::generation::{LogitsProcessor, Sampling};
use candle_transformers::models::llama::{Cache, Config as LlamaConfig, Llama};
use candle_transformers::models::quantized_llama::ModelWeights;

/// An inference-only causal LM. Each call decodes independently; no state is
/// shared between calls, so one instance can serve concurrent requests.
pub trait CausalLm: Send + Sync {
    /// Greedily extend `prompt_ids` by at most `max_new_tokens`, stopping
    /// after `eos`. Returns prompt and continuation together.
    fn generate_ids(&self, prompt_ids: &[u32], max_new_tokens: usize, eos: Option<u32>) -> Result<Vec<u32>>;

    fn device(&self) -> &Device;
}

/// Shared decoding loop; `step` runs one forward pass returning last-position
/// logits for the given tokens at offset `pos`.
fn greedy_decode<F>(prompt_ids: &[u32], max_new_tokens: usize, max_seq: usize, eos: Option<u32>, device: &Device, mut step: F) -> Result<Vec<u32>>
where
    F: FnMut(&Tensor, usize) -> Result<Tensor>,
{
    let mut tokens = prompt_ids.to_vec();
    let mut logits_processor = LogitsProcessor::from_sampling(0, Sampling::ArgMax);
    let mut pos = 0;
    for _ in 0..max_new_tokens {
        if tokens.len() >= max_seq { break; }
        let context = &tokens[pos..];
        let input = Tensor::new(context, device)?.unsqueeze(0)?;
        let logits = step(&input, pos)?.squeeze(0)?.to_dtype(DType::F32)?;
        pos = tokens.len();
        let next = logits_processor.sample(&logits)?;
        tokens.push(next);
        if Some(next) == eos { break; }
    }
    Ok(tokens)
}

pub struct LlamaLm {
    model: Llama,
    config: LlamaConfig,
    dtype: DType,
    device: Device,
}

impl LlamaLm {
    pub fn new(model: Llama, config: LlamaConfig, dtype: DType, device: Device) -> Self {
        Self { model, config, dtype, device }
    }
}

impl CausalLm for LlamaLm {
    fn generate_ids(&self, prompt_ids: &[u32], max_new_tokens: usize, eos: Option<u32>) -> Result<Vec<u32>> {
        let mut cache = Cache::new(true, self.dtype, &self.config, &self.device)?;
        greedy_decode(prompt_ids, max_new_tokens, self.config.max_position_embeddings, eos, &self.device, |input, pos| {
            Ok(self.model.forward(input, pos, &mut cache)?)
        })
    }

    fn device(&self) -> &Device { &self.device }
}

pub struct QuantizedLm {
    weights: ModelWeights,
    max_seq: usize,
    device: Device,
}

impl QuantizedLm {
    pub fn new(weights: ModelWeights, max_seq: usize, device: Device) -> Self {
        Self { weights, max_seq, device }
    }
}

impl CausalLm for QuantizedLm {
    fn generate_ids(&self, prompt_ids: &[u32], max_new_tokens: usize, eos: Option<u32>) -> Result<Vec<u32>> {
        // The kv cache lives inside the weights; a clone shares tensors but
        // gives this call its own cache.
        let mut weights = self.weights.clone();
        greedy_decode(prompt_ids, max_new_tokens, self.max_seq, eos, &self.device, |input, pos| {
            Ok(weights.forward(input, pos)?)
        })
    }

    fn device(&self) -> &Device { &self.device }
}
