//! Answer backends tried in order by the chat gateway.
use anyhow::{anyhow, Result};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, instrument};

use finrag_core::types::GenerationResponse;

#[derive(Debug, Clone)]
pub enum AnswerBackend {
    /// Ollama `/api/generate`, non-streaming.
    Ollama { url: String, model: String, timeout: Duration },
    /// The finrag model server's `/generate`.
    ModelServer { url: String, timeout: Duration },
}

impl AnswerBackend {
    /// Value of the `source` field in chat responses.
    pub fn source(&self) -> &'static str {
        match self {
            Self::Ollama { .. } => "ollama",
            Self::ModelServer { .. } => "model-server",
        }
    }

    /// Non-2xx statuses, timeouts and unparseable bodies are all failures.
    #[instrument(skip(self, client, prompt), fields(source = self.source()))]
    pub async fn answer(&self, client: &reqwest::Client, prompt: &str, max_tokens: usize, temperature: f64) -> Result<String> {
        let start = std::time::Instant::now();
        let answer = match self {
            Self::Ollama { url, model, timeout } => {
                let body: Value = client
                    .post(url)
                    .json(&json!({ "model": model, "prompt": prompt, "stream": false }))
                    .timeout(*timeout)
                    .send()
                    .await?
                    .error_for_status()?
                    .json()
                    .await?;
                ollama_answer(&body)
            }
            Self::ModelServer { url, timeout } => {
                let body: GenerationResponse = client
                    .post(url)
                    .json(&json!({ "prompt": prompt, "max_tokens": max_tokens, "temperature": temperature }))
                    .timeout(*timeout)
                    .send()
                    .await?
                    .error_for_status()
                    .map_err(|e| anyhow!("model server: {e}"))?
                    .json()
                    .await?;
                body.answer
            }
        };
        debug!(elapsed_ms = start.elapsed().as_millis() as u64, "backend answered");
        Ok(answer)
    }
}

/// `response`, else `text`, else the whole body as JSON text.
fn ollama_answer(body: &Value) -> String {
    ["response", "text"]
        .iter()
        .find_map(|k| body.get(k).and_then(Value::as_str).filter(|s| !s.is_empty()))
        .map_or_else(|| body.to_string(), str::to_string)
}
