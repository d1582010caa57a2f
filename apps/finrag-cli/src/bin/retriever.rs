//! TF-IDF retriever service: `POST /retrieve`.
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use finrag_api::{retriever_router, serve, RetrieverState};
use finrag_cli::{init_tracing, load_config};
use finrag_core::corpus::load_corpus;
use finrag_text::TfidfRetriever;

#[derive(Parser, Debug)]
#[command(name = "finrag-retriever", about = "Serve top-k TF-IDF contexts over HTTP")]
struct Args {
    /// JSON file of {id, text} documents or a directory of .txt files
    #[arg(long)]
    corpus: Option<PathBuf>,
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let mut settings = load_config()?.retriever()?;
    if let Some(corpus) = args.corpus { settings.corpus_path = Some(corpus); }
    if let Some(host) = args.host { settings.host = host; }
    if let Some(port) = args.port { settings.port = port; }

    let retriever = TfidfRetriever::new(load_corpus(settings.corpus_path.as_deref())?);
    info!(documents = retriever.documents().len(), default_k = settings.default_k, "retriever ready");

    let state = RetrieverState { retriever: Arc::new(retriever), default_k: settings.default_k };
    serve(retriever_router(state), &settings.host, settings.port, "retriever").await?;
    Ok(())
}
