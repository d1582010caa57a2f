//! Chat gateway: `POST /api/chat`, `GET /health`.
use clap::Parser;
use tracing::info;

use finrag_api::{gateway_router, serve, GatewayState};
use finrag_cli::{init_tracing, load_config};

#[derive(Parser, Debug)]
#[command(name = "finrag-gateway", about = "Route chat questions to live prices, Ollama or the model server")]
struct Args {
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let mut settings = load_config()?.gateway()?;
    if let Some(host) = args.host { settings.host = host; }
    if let Some(port) = args.port { settings.port = port; }

    info!(
        retriever = %settings.retriever_url,
        ollama = %settings.ollama_url,
        model_server = %settings.model_server_url,
        live_prices = settings.stock_api_key.is_some(),
        "gateway upstreams"
    );
    let state = GatewayState::from_settings(&settings)?;
    serve(gateway_router(state), &settings.host, settings.port, "gateway").await?;
    Ok(())
}
