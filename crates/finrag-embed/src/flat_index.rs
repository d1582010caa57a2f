use anyhow::{Result, ensure};

/// Exact inner-product index. Vectors are L2-normalised on insert, so scores
/// are cosine similarities.
#[derive(Debug, Clone)]
pub struct FlatIpIndex {
    dim: usize,
    data: Vec<f32>,
}

impl FlatIpIndex {
    pub fn new(dim: usize) -> Result<Self> {
        ensure!(dim > 0, "index dimension must be positive");
        Ok(Self { dim, data: Vec::new() })
    }

    pub fn dim(&self) -> usize { self.dim }

    pub fn len(&self) -> usize { self.data.len() / self.dim }

    pub fn is_empty(&self) -> bool { self.data.is_empty() }

    pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        for v in vectors {
            ensure!(v.len() == self.dim, "vector dim {} != index dim {}", v.len(), self.dim);
            self.data.extend(normalized(v));
        }
        Ok(())
    }

    /// Top `k` `(position, score)` pairs, best first; ties keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        ensure!(query.len() == self.dim, "query dim {} != index dim {}", query.len(), self.dim);
        let q = normalized(query);
        let mut scored: Vec<(usize, f32)> = self.data.chunks(self.dim).enumerate()
            .map(|(i, row)| (i, row.iter().zip(&q).map(|(a, b)| a * b).sum()))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }
}

fn normalized(v: &[f32]) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 { v.to_vec() } else { v.iter().map(|x| x / norm).collect() }
}
