//! finrag-text
//!
//! Lexical retrieval over a small in-memory corpus: a tantivy text analyzer
//! with English stop words, a TF-IDF vectorizer, and the cosine-ranking
//! `TfidfRetriever` served by the retriever service.
pub mod analyzer;
pub mod retriever;
pub mod tfidf;

pub use analyzer::TermAnalyzer;
pub use retriever::TfidfRetriever;
pub use tfidf::{SparseVector, TfidfVectorizer};
