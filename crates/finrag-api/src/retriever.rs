use axum::{Json, Router, extract::State, routing::post};
use std::sync::Arc;

use finrag_core::traits::Retriever;
use finrag_core::types::{RetrieveRequest, RetrieveResponse};

#[derive(Clone)]
pub struct RetrieverState {
    pub retriever: Arc<dyn Retriever>,
    /// Used when the request omits `k`.
    pub default_k: usize,
}

pub fn retriever_router(state: RetrieverState) -> Router {
    Router::new().route("/retrieve", post(retrieve)).with_state(state)
}

/// `POST /retrieve`. Ranking has no failure mode; only malformed bodies are
/// rejected, by the `Json` extractor.
async fn retrieve(State(state): State<RetrieverState>, Json(req): Json<RetrieveRequest>) -> Json<RetrieveResponse> {
    let contexts = state.retriever.retrieve(&req.query, req.k_or(state.default_k));
    Json(RetrieveResponse { contexts })
}
