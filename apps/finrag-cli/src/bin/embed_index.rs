//! Offline utility: embed a directory of .txt files into a JSON vector file
//! and optionally run one inner-product query against it.
use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tracing::info;

use finrag_cli::{init_tracing, load_config};
use finrag_core::corpus::load_corpus;
use finrag_embed::{embed_texts, get_default_embedder, Embedder, FlatIpIndex};

#[derive(Parser, Debug)]
#[command(name = "finrag-embed-index", about = "Embed .txt documents into a flat inner-product index")]
struct Args {
    /// Directory of .txt files (defaults to `data.raw_txt_dir`, else the demo corpus)
    dir: Option<PathBuf>,
    #[arg(long, default_value = "vectors.json")]
    out: PathBuf,
    #[arg(long, default_value_t = 16)]
    batch_size: usize,
    /// Query to run against the freshly built index
    #[arg(long)]
    query: Option<String>,
    #[arg(long, default_value_t = 3)]
    top_k: usize,
}

#[derive(Serialize)]
struct StoredVector<'a> {
    id: &'a str,
    vector: &'a [f32],
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let config = load_config()?;
    let dir = args.dir.or_else(|| config.get::<String>("data.raw_txt_dir").ok().map(PathBuf::from));

    let docs = load_corpus(dir.as_deref())?;
    let embedder: Box<dyn Embedder> = get_default_embedder()?;
    let texts: Vec<String> = docs.iter().map(|d| d.text.clone()).collect();
    let vectors = embed_texts(embedder.as_ref(), &texts, args.batch_size)?;

    let stored: Vec<StoredVector<'_>> = docs.iter().zip(&vectors).map(|(d, v)| StoredVector { id: &d.id, vector: v }).collect();
    fs::write(&args.out, serde_json::to_vec(&stored)?).with_context(|| format!("writing {}", args.out.display()))?;
    info!(documents = docs.len(), dim = embedder.dim(), out = %args.out.display(), "embeddings written");

    if let Some(query) = args.query {
        let mut index = FlatIpIndex::new(embedder.dim())?;
        index.add(&vectors)?;
        let q = embedder.embed_batch(std::slice::from_ref(&query))?;
        let q = q.first().context("embedder returned no query vector")?;
        for (rank, (i, score)) in index.search(q, args.top_k)?.into_iter().enumerate() {
            println!("{}. {} ({score:.4})", rank + 1, docs[i].id);
        }
    }
    Ok(())
}
