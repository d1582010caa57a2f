//! Domain and wire types shared by the retriever, model server and gateway.

use serde::{Deserialize, Serialize};

pub const DEFAULT_K: usize = 4;
pub const DEFAULT_MAX_TOKENS: usize = 256;

/// A corpus entry. Fixed at startup; `id` is its identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: id.into(), text: text.into() }
    }
}

/// A document paired with its cosine similarity to a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedContext {
    pub id: String,
    pub text: String,
    pub score: f32,
}

/// `k` may be omitted (service default) or out of range (clamped by the ranker).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k: Option<i64>,
}

impl RetrieveRequest {
    pub fn k_or(&self, default_k: usize) -> i64 {
        self.k.unwrap_or_else(|| i64::try_from(default_k).unwrap_or(i64::MAX))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveResponse {
    pub contexts: Vec<RankedContext>,
}

/// `temperature` is accepted for compatibility; decoding is always greedy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default)]
    pub temperature: f64,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self { prompt: prompt.into(), max_tokens: DEFAULT_MAX_TOKENS, temperature: 0.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub answer: String,
}

fn default_max_tokens() -> usize {
    DEFAULT_MAX_TOKENS
}
