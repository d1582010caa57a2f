use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use finrag_core::traits::TextGenerator;
use finrag_core::types::{GenerationRequest, GenerationResponse};

use crate::error::ApiError;

#[derive(Clone)]
pub struct ModelServerState {
    pub generator: Arc<dyn TextGenerator>,
    /// Serialized load report; `null` when the generator was not loaded
    /// through the fallback chain.
    pub load_report: Arc<serde_json::Value>,
}

impl ModelServerState {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator, load_report: Arc::new(serde_json::Value::Null) }
    }

    pub fn with_load_report(mut self, report: serde_json::Value) -> Self {
        self.load_report = Arc::new(report);
        self
    }
}

pub fn model_server_router(state: ModelServerState) -> Router {
    Router::new()
        .route("/generate", post(generate))
        .route("/health", get(health))
        .route("/load-report", get(load_report))
        .with_state(state)
}

/// `POST /generate`. Inference is blocking, so it runs on the blocking pool;
/// there is no timeout and no queueing.
async fn generate(State(state): State<ModelServerState>, Json(req): Json<GenerationRequest>) -> Result<Json<GenerationResponse>, ApiError> {
    if req.temperature > 0.0 {
        debug!(temperature = req.temperature, "temperature ignored, decoding is greedy");
    }
    let generator = state.generator.clone();
    let answer = tokio::task::spawn_blocking(move || generator.generate(&req))
        .await
        .map_err(|e| anyhow::anyhow!("generation task failed: {e}"))??;
    Ok(Json(GenerationResponse { answer }))
}

/// `GET /health`: static readiness; the router only exists once the model is loaded.
async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ready" })))
}

async fn load_report(State(state): State<ModelServerState>) -> Json<serde_json::Value> {
    Json((*state.load_report).clone())
}
