use crate::types::{GenerationRequest, RankedContext};

/// Dense text embedder used by the offline indexing utility.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Ranks a fixed corpus against a query.
///
/// Implementations have no error path: every query yields a ranking, and
/// `k` is clamped into `[1, corpus_len]`.
pub trait Retriever: Send + Sync {
    fn retrieve(&self, query: &str, k: i64) -> Vec<RankedContext>;
    fn corpus_len(&self) -> usize;
}

/// Produces an answer for a generation request. The model server's handlers
/// only see this trait, so tests can inject a scripted generator.
pub trait TextGenerator: Send + Sync {
    fn generate(&self, request: &GenerationRequest) -> anyhow::Result<String>;
}
