//! TF-IDF term space fitted once over a corpus.
//!
//! Weights follow the usual smoothed scheme: raw term counts times
//! `ln((1 + n) / (1 + df)) + 1`, with every row L2-normalised so that cosine
//! similarity reduces to a dot product.

use std::collections::{BTreeSet, HashMap};

use crate::analyzer::TermAnalyzer;

/// Sparse row: `(term_index, weight)` pairs sorted by term index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
    entries: Vec<(usize, f32)>,
}

impl SparseVector {
    fn from_counts(counts: HashMap<usize, f32>, idf: &[f32]) -> Self {
        let mut entries: Vec<(usize, f32)> = counts.into_iter().map(|(i, tf)| (i, tf * idf[i])).collect();
        entries.sort_by_key(|(i, _)| *i);
        let norm = entries.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
        if norm > 0.0 { for (_, w) in &mut entries { *w /= norm; } }
        Self { entries }
    }

    pub fn entries(&self) -> &[(usize, f32)] { &self.entries }

    pub fn is_zero(&self) -> bool { self.entries.is_empty() }

    pub fn norm(&self) -> f32 { self.entries.iter().map(|(_, w)| w * w).sum::<f32>().sqrt() }

    pub fn dot(&self, other: &SparseVector) -> f32 {
        let (mut a, mut b, mut acc) = (0, 0, 0.0f32);
        while a < self.entries.len() && b < other.entries.len() {
            let (ia, wa) = self.entries[a];
            let (ib, wb) = other.entries[b];
            match ia.cmp(&ib) {
                std::cmp::Ordering::Less => a += 1,
                std::cmp::Ordering::Greater => b += 1,
                std::cmp::Ordering::Equal => { acc += wa * wb; a += 1; b += 1; }
            }
        }
        acc
    }

    /// Cosine similarity; zero when either side is the zero vector.
    pub fn cosine(&self, other: &SparseVector) -> f32 {
        let denom = self.norm() * other.norm();
        if denom == 0.0 { 0.0 } else { self.dot(other) / denom }
    }
}

pub struct TfidfVectorizer {
    analyzer: TermAnalyzer,
    vocabulary: HashMap<String, usize>,
    idf: Vec<f32>,
}

impl TfidfVectorizer {
    /// Fit the vocabulary and idf weights, returning the vectorizer and one
    /// row per input text.
    pub fn fit_transform<S: AsRef<str>>(texts: &[S]) -> (Self, Vec<SparseVector>) {
        let analyzer = TermAnalyzer::new();
        let analyzed: Vec<Vec<String>> = texts.iter().map(|t| analyzer.terms(t.as_ref())).collect();

        let terms: BTreeSet<&String> = analyzed.iter().flatten().collect();
        let vocabulary: HashMap<String, usize> = terms.into_iter().enumerate().map(|(i, t)| (t.clone(), i)).collect();

        let mut df = vec![0usize; vocabulary.len()];
        for doc in &analyzed {
            let unique: BTreeSet<usize> = doc.iter().filter_map(|t| vocabulary.get(t).copied()).collect();
            for i in unique { df[i] += 1; }
        }
        let n = texts.len() as f32;
        let idf = df.iter().map(|&d| ((1.0 + n) / (1.0 + d as f32)).ln() + 1.0).collect();

        let vectorizer = Self { analyzer, vocabulary, idf };
        let rows = analyzed.iter().map(|terms| vectorizer.weigh(terms)).collect();
        (vectorizer, rows)
    }

    /// Project `text` into the fitted term space. Unknown terms are ignored.
    pub fn transform(&self, text: &str) -> SparseVector {
        self.weigh(&self.analyzer.terms(text))
    }

    pub fn vocabulary_len(&self) -> usize { self.vocabulary.len() }

    pub fn term_index(&self, term: &str) -> Option<usize> { self.vocabulary.get(term).copied() }

    fn weigh(&self, terms: &[String]) -> SparseVector {
        let mut counts: HashMap<usize, f32> = HashMap::new();
        for term in terms {
            if let Some(&i) = self.vocabulary.get(term) { *counts.entry(i).or_insert(0.0) += 1.0; }
        }
        SparseVector::from_counts(counts, &self.idf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vocabulary_is_sorted_and_stop_word_free() {
        let (v, _) = TfidfVectorizer::fit_transform(&["the bond yields", "bond rates"]);
        assert_eq!(v.vocabulary_len(), 3);
        assert_eq!(v.term_index("bond"), Some(0));
        assert_eq!(v.term_index("rates"), Some(1));
        assert_eq!(v.term_index("the"), None);
    }

    #[test]
    fn rows_are_unit_length() {
        let (_, rows) = TfidfVectorizer::fit_transform(&["ebitda margin ebitda", "bond yields"]);
        for row in rows { assert!((row.norm() - 1.0).abs() < 1e-6); }
    }

    #[test]
    fn rarer_terms_weigh_more() {
        let (v, _) = TfidfVectorizer::fit_transform(&["bond yields", "bond rates", "bond inflation"]);
        let q = v.transform("bond yields");
        let bond = v.term_index("bond").unwrap();
        let yields = v.term_index("yields").unwrap();
        let w = |i| q.entries().iter().find(|(j, _)| *j == i).map(|(_, w)| *w).unwrap();
        assert!(w(yields) > w(bond));
    }

    #[test]
    fn unknown_query_is_zero() {
        let (v, rows) = TfidfVectorizer::fit_transform(&["bond yields"]);
        let q = v.transform("cryptocurrency");
        assert!(q.is_zero());
        assert_eq!(q.cosine(&rows[0]), 0.0);
    }
}
