//! `POST /api/chat`: live price lookup, else retrieval-augmented answer from
//! the first backend that responds.
mod backend;
mod price;
mod prompt;

pub use backend::AnswerBackend;
pub use price::{extract_ticker, looks_like_price_question, LiveQuote, PriceFeed};
pub use prompt::{build_chat_prompt, FINANCE_SYSTEM};

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use finrag_core::config::GatewaySettings;
use finrag_core::types::{RankedContext, RetrieveRequest, RetrieveResponse, DEFAULT_MAX_TOKENS};

use crate::error::ApiError;

/// Contexts requested from the retriever per chat turn.
pub const CHAT_K: i64 = 4;

#[derive(Clone)]
pub struct GatewayState {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    client: reqwest::Client,
    retriever_url: String,
    retriever_timeout: Duration,
    backends: Vec<AnswerBackend>,
    price_feed: Option<PriceFeed>,
}

impl GatewayState {
    /// Backends run Ollama first, then the model server. The live price path
    /// is enabled only when a stock API key is configured.
    pub fn from_settings(settings: &GatewaySettings) -> anyhow::Result<Self> {
        let backends = vec![
            AnswerBackend::Ollama {
                url: settings.ollama_url.clone(),
                model: settings.ollama_model.clone(),
                timeout: Duration::from_millis(settings.ollama_timeout_ms),
            },
            AnswerBackend::ModelServer {
                url: settings.model_server_url.clone(),
                timeout: Duration::from_millis(settings.primary_timeout_ms),
            },
        ];
        let price_feed = settings
            .stock_api_key
            .as_ref()
            .filter(|k| !k.is_empty())
            .map(|k| PriceFeed { base_url: settings.stock_api_base.clone(), api_key: k.clone() });
        Ok(Self {
            inner: Arc::new(GatewayInner {
                client: reqwest::Client::builder().build()?,
                retriever_url: settings.retriever_url.clone(),
                retriever_timeout: Duration::from_millis(settings.retriever_timeout_ms),
                backends,
                price_feed,
            }),
        })
    }
}

pub fn gateway_router(state: GatewayState) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/health", get(|| async { Json(json!({ "status": "ok" })) }))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default)]
    pub temperature: f64,
}

fn default_max_tokens() -> usize {
    DEFAULT_MAX_TOKENS
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub source: &'static str,
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contexts: Option<Vec<RankedContext>>,
    pub live: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<Value>,
}

async fn chat(State(state): State<GatewayState>, Json(req): Json<ChatRequest>) -> Result<Json<ChatResponse>, ApiError> {
    let question = req.prompt.as_deref().filter(|p| !p.is_empty()).ok_or_else(|| ApiError::bad_request("missing prompt"))?;
    let gw = &state.inner;

    if let Some(reply) = live_price(gw, question).await {
        return Ok(Json(reply));
    }

    let contexts = retrieve(gw, question).await;
    let prompt = build_chat_prompt(&contexts, question);
    debug!(user_len = question.len(), full_len = prompt.len(), contexts = contexts.len(), "prompt built");

    for backend in &gw.backends {
        match backend.answer(&gw.client, &prompt, req.max_tokens, req.temperature).await {
            Ok(answer) => {
                info!(source = backend.source(), "chat answered");
                return Ok(Json(ChatResponse {
                    source: backend.source(),
                    answer,
                    contexts: Some(contexts),
                    live: false,
                    ticker: None,
                    quote: None,
                }));
            }
            Err(e) => warn!(source = backend.source(), error = %e, "answer backend failed"),
        }
    }
    Err(ApiError::bad_gateway("all_fallbacks_failed", "live API, ollama, and primary all failed"))
}

/// `None` means "not a price question" or "quote unavailable"; either way the
/// regular retrieval path answers.
async fn live_price(gw: &GatewayInner, question: &str) -> Option<ChatResponse> {
    let feed = gw.price_feed.as_ref()?;
    let ticker = extract_ticker(question)?;
    if !looks_like_price_question(question) {
        return None;
    }
    info!(ticker = %ticker, "live price query");
    match feed.fetch(&gw.client, &ticker).await {
        Ok(quote) => Some(ChatResponse {
            source: "live-price-api",
            answer: quote.answer(),
            contexts: None,
            live: true,
            ticker: Some(quote.symbol.clone()),
            quote: Some(quote.raw),
        }),
        Err(e) => {
            warn!(ticker = %ticker, error = %e, "live price failed, falling back to LLM");
            None
        }
    }
}

/// Best effort: any failure yields no contexts.
async fn retrieve(gw: &GatewayInner, question: &str) -> Vec<RankedContext> {
    let request = RetrieveRequest { query: question.to_string(), k: Some(CHAT_K) };
    let result = async {
        gw.client
            .post(&gw.retriever_url)
            .json(&request)
            .timeout(gw.retriever_timeout)
            .send()
            .await?
            .error_for_status()?
            .json::<RetrieveResponse>()
            .await
    }
    .await;
    match result {
        Ok(resp) => resp.contexts,
        Err(e) => {
            warn!(error = %e, "retriever failed");
            Vec::new()
        }
    }
}
