use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::Error;
use crate::types::Document;

/// The demo corpus served when no `corpus_path` is configured.
pub fn demo_corpus() -> Vec<Document> {
    vec![
        Document::new("doc1", "EBITDA stands for Earnings Before Interest, Taxes, Depreciation, and Amortization. It measures operating profitability."),
        Document::new("doc2", "Inflation affects bond yields because rising inflation reduces real returns, causing yields to increase."),
        Document::new("doc3", "Repo rate is the rate at which central banks lend to commercial banks and affects short-term interest rates."),
        Document::new("doc4", "Company financials show revenue, net income, and EBITDA margins; analysts use EBITDA margin for comparison."),
    ]
}

/// Load the corpus from `path`, or the demo corpus when `path` is `None`.
///
/// A `.json` file must hold an array of `{id, text}` objects. A directory is
/// walked for `.txt` files, each one a document whose id is the file stem.
/// An empty corpus is rejected: ranking needs at least one document.
pub fn load_corpus(path: Option<&Path>) -> Result<Vec<Document>> {
    let docs = match path {
        None => demo_corpus(),
        Some(p) if p.is_dir() => read_txt_dir(p)?,
        Some(p) => {
            let raw = fs::read_to_string(p).with_context(|| format!("reading corpus {}", p.display()))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing corpus {}", p.display()))?
        }
    };
    if docs.is_empty() {
        return Err(Error::InvalidConfig("corpus has no documents".into()).into());
    }
    info!(documents = docs.len(), "corpus loaded");
    Ok(docs)
}

fn read_txt_dir(root: &Path) -> Result<Vec<Document>> {
    let files = list_txt_files(root);
    let mut docs = Vec::with_capacity(files.len());
    for file_path in &files {
        debug!(path = %file_path.display(), "reading corpus file");
        docs.push(Document::new(doc_id(file_path), read_file_content(file_path)?.trim()));
    }
    Ok(docs)
}

fn read_file_content(file_path: &Path) -> Result<String> {
    match fs::read_to_string(file_path) {
        Ok(content) => Ok(content),
        Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
    }
}

fn doc_id(file_path: &Path) -> String {
    file_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| file_path.display().to_string())
}

pub fn list_txt_files(root: &Path) -> Vec<PathBuf> {
    let mut txt_files = Vec::new();
    for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("txt") { txt_files.push(path.to_path_buf()); }
    }
    txt_files.sort();
    txt_files
}
