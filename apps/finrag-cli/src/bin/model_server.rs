//! Fine-tuned model server: `POST /generate`, `GET /health`.
//!
//! The model is loaded once before the listener binds; if no load strategy
//! succeeds the process exits with the chain's error.
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use finrag_api::{model_server_router, serve, ModelServerState};
use finrag_cli::{init_tracing, load_config};
use finrag_llm::{load_model, AdapterStatus, GenerationService, LoadOptions};

#[derive(Parser, Debug)]
#[command(name = "finrag-model-server", about = "Serve greedy finance answers from a causal LM")]
struct Args {
    /// Hub repository id or local model directory
    #[arg(long)]
    model_id: Option<String>,
    #[arg(long)]
    offload_dir: Option<PathBuf>,
    /// 4-bit GGUF file inside the model repository
    #[arg(long)]
    gguf_file: Option<String>,
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let mut settings = load_config()?.model_server()?;
    if let Some(id) = args.model_id { settings.model_id = id; }
    if let Some(dir) = args.offload_dir { settings.offload_dir = dir; }
    if args.gguf_file.is_some() { settings.gguf_file = args.gguf_file; }
    if let Some(host) = args.host { settings.host = host; }
    if let Some(port) = args.port { settings.port = port; }

    let opts = LoadOptions::from(&settings);
    let handle = tokio::task::spawn_blocking(move || load_model(&opts)).await??;

    let report = &handle.report;
    info!(model_id = %report.model_id, strategy = report.strategy, device = %report.device, "model ready");
    match &report.adapter {
        AdapterStatus::NotApplied { reason } => warn!(%reason, "serving base model without adapter"),
        status => info!(?status, "adapter"),
    }
    let report_json = serde_json::to_value(report)?;

    let generator = GenerationService::from_handle(handle);
    let state = ModelServerState::new(Arc::new(generator)).with_load_report(report_json);
    serve(model_server_router(state), &settings.host, settings.port, "model-server").await?;
    Ok(())
}
