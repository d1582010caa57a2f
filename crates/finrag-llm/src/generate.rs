use anyhow::{Result, anyhow};
use std::ops::Deref;
use tokenizers::Tokenizer;
use tracing::debug;

use finrag_core::traits::TextGenerator;
use finrag_core::types::GenerationRequest;

use crate::loader::ModelHandle;
use crate::model::CausalLm;

pub const SYSTEM_PROMPT: &str = "You are a finance assistant. Answer only finance-related questions. \
Be concise and base answers on provided context.";

/// Text <-> token id conversion used around generation.
pub trait TokenCodec: Send + Sync {
    fn encode(&self, text: &str) -> Result<Vec<u32>>;
    /// Decode with special tokens removed.
    fn decode(&self, ids: &[u32]) -> Result<String>;
    fn eos_id(&self) -> Option<u32>;
}

// The tokenizers methods live on the inner `TokenizerImpl`; calling them
// through `deref` keeps them from resolving to this trait.
impl TokenCodec for Tokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        Ok(self.deref().encode(text, true).map_err(|e| anyhow!("Tokenization failed: {}", e))?.get_ids().to_vec())
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        self.deref().decode(ids, true).map_err(|e| anyhow!("Decoding failed: {}", e))
    }

    fn eos_id(&self) -> Option<u32> {
        ["</s>", "<|endoftext|>", "<eos>", "<|eot_id|>"].iter().find_map(|t| self.token_to_id(t))
    }
}

/// System instruction and caller prompt, separated by a blank line.
pub fn build_prompt(system: &str, prompt: &str) -> String {
    format!("{system}\n\n{prompt}")
}

/// Drop the first `prompt_text.chars().count()` characters of `full` and trim.
pub fn strip_prompt(full: &str, prompt_text: &str) -> String {
    full.chars().skip(prompt_text.chars().count()).collect::<String>().trim().to_string()
}

/// Greedy generation behind a fixed system instruction.
pub struct GenerationService {
    codec: Box<dyn TokenCodec>,
    model: Box<dyn CausalLm>,
    system_prompt: String,
}

impl GenerationService {
    pub fn new(codec: Box<dyn TokenCodec>, model: Box<dyn CausalLm>) -> Self {
        Self { codec, model, system_prompt: SYSTEM_PROMPT.to_string() }
    }

    pub fn from_handle(handle: ModelHandle) -> Self {
        Self::new(Box::new(handle.tokenizer), handle.model)
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }
}

impl TextGenerator for GenerationService {
    /// `temperature` is ignored: decoding is always greedy.
    fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let full_prompt = build_prompt(&self.system_prompt, &request.prompt);
        let input_ids = self.codec.encode(&full_prompt)?;
        let output_ids = self.model.generate_ids(&input_ids, request.max_tokens, self.codec.eos_id())?;
        let text = self.codec.decode(&output_ids)?;
        let prompt_text = self.codec.decode(&input_ids)?;
        debug!(input_tokens = input_ids.len(), output_tokens = output_ids.len(), "generation finished");
        Ok(strip_prompt(&text, &prompt_text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_counts_characters_not_bytes() {
        assert_eq!(strip_prompt("€uro margin  grew ", "€uro"), "margin  grew");
        assert_eq!(strip_prompt("short", "longer prompt"), "");
    }

    #[test]
    fn prompt_is_joined_by_blank_line() {
        assert_eq!(build_prompt("sys", "What is EBITDA?"), "sys\n\nWhat is EBITDA?");
    }
}
