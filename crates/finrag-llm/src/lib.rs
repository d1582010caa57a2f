//! finrag-llm
//!
//! Loads a causal language model through an ordered fallback chain
//! (4-bit GGUF, GPU with offload directory, CPU), merges a LoRA adapter when
//! one is published, and serves greedy generation behind a fixed system
//! instruction.
pub mod adapter;
pub mod chain;
pub mod generate;
pub mod loader;
pub mod model;
pub mod source;
pub mod strategy;

pub use adapter::AdapterStatus;
pub use chain::{Attempt, FallbackChain, LoadStrategy, Outcome};
pub use generate::{GenerationService, TokenCodec, SYSTEM_PROMPT};
pub use loader::{load_model, LoadOptions, LoadReport, ModelHandle};
pub use model::CausalLm;
