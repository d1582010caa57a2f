use tracing::{debug, info};

use finrag_core::traits::Retriever;
use finrag_core::types::{Document, RankedContext};

use crate::tfidf::{SparseVector, TfidfVectorizer};

/// Cosine ranking over a TF-IDF index built once at construction.
///
/// The index is never mutated afterwards, so a single instance can be shared
/// across request handlers without locking.
pub struct TfidfRetriever {
	docs: Vec<Document>,
	vectorizer: TfidfVectorizer,
	rows: Vec<SparseVector>,
}

impl TfidfRetriever {
	/// `docs` must not be empty; corpus loading rejects empty corpora.
	pub fn new(docs: Vec<Document>) -> Self {
		let texts: Vec<&str> = docs.iter().map(|d| d.text.as_str()).collect();
		let (vectorizer, rows) = TfidfVectorizer::fit_transform(&texts);
		info!(documents = docs.len(), terms = vectorizer.vocabulary_len(), "tf-idf index built");
		Self { docs, vectorizer, rows }
	}

	pub fn documents(&self) -> &[Document] { &self.docs }

	/// Clamp a requested `k` into `[1, N]`.
	pub fn clamp_k(&self, k: i64) -> usize {
		let n = self.docs.len().max(1) as i64;
		k.clamp(1, n) as usize
	}

	/// Rank every document and keep the top `k` (clamped). Zero and negative
	/// scores are returned as-is; ties keep corpus order.
	pub fn rank(&self, query: &str, k: i64) -> Vec<RankedContext> {
		let k = self.clamp_k(k);
		let q = self.vectorizer.transform(query);
		let sims: Vec<f32> = self.rows.iter().map(|row| q.cosine(row)).collect();

		let mut order: Vec<usize> = (0..self.docs.len()).collect();
		order.sort_by(|&a, &b| sims[b].partial_cmp(&sims[a]).unwrap_or(std::cmp::Ordering::Equal));
		debug!(query, k, "ranked corpus");

		order.into_iter().take(k).map(|idx| RankedContext {
			id: self.docs[idx].id.clone(),
			text: self.docs[idx].text.clone(),
			score: sims[idx],
		}).collect()
	}
}

impl Retriever for TfidfRetriever {
	fn retrieve(&self, query: &str, k: i64) -> Vec<RankedContext> { self.rank(query, k) }

	fn corpus_len(&self) -> usize { self.docs.len() }
}
