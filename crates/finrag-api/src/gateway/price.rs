//! Live stock quotes for questions like "current price of AAPL".
use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::sync::LazyLock;
use std::time::Duration;

const PRICE_PHRASES: &[&str] = &[
    "stock price",
    "current price",
    "price of",
    "price for",
    "trading at",
    "live price",
    "kitna chal",
];

/// Uppercase words that are never tickers.
const TICKER_STOP: &[&str] = &[
    "WHAT", "IS", "THE", "OF", "PRICE", "STOCK", "TODAY", "CURRENT", "PLEASE", "LIVE", "KITNA", "CHAL", "RAHA", "HAI",
];

static TICKER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[A-Z]{1,5}\b").expect("ticker pattern"));

pub const QUOTE_TIMEOUT: Duration = Duration::from_secs(8);

pub fn looks_like_price_question(question: &str) -> bool {
    let q = question.to_lowercase();
    PRICE_PHRASES.iter().any(|p| q.contains(p))
}

/// First 1-5 letter word of the uppercased question that is not a stop word.
pub fn extract_ticker(question: &str) -> Option<String> {
    let upper = question.to_uppercase();
    TICKER_RE
        .find_iter(&upper)
        .map(|m| m.as_str())
        .find(|t| !TICKER_STOP.contains(t))
        .map(str::to_string)
}

#[derive(Debug, Clone, Serialize)]
pub struct LiveQuote {
    pub symbol: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: String,
    /// Upstream `Global Quote` object, passed through to the client.
    pub raw: Value,
}

impl LiveQuote {
    /// Parse an Alpha Vantage `GLOBAL_QUOTE` body. A body without a price is
    /// an error so the caller can fall back to the LLM path.
    pub fn from_global_quote(body: &Value, ticker: &str) -> Result<Self> {
        let quote = body.get("Global Quote").filter(|q| q.is_object()).ok_or_else(|| anyhow!("No quote data found"))?;
        let field = |k: &str| quote.get(k).and_then(Value::as_str).filter(|s| !s.is_empty());
        let price = field("05. price")
            .ok_or_else(|| anyhow!("No quote data found"))?
            .trim()
            .parse::<f64>()
            .context("unparseable price")?;
        Ok(Self {
            symbol: field("01. symbol").unwrap_or(ticker).to_string(),
            price,
            change: field("09. change").and_then(|c| c.trim().parse().ok()).unwrap_or(0.0),
            change_percent: field("10. change percent").unwrap_or_default().to_string(),
            raw: quote.clone(),
        })
    }

    pub fn answer(&self) -> String {
        let mut text = format!("Current price of {} is {:.2} USD. ", self.symbol, self.price);
        if self.change != 0.0 {
            text.push_str(&format!("Change: {:.2} ({}).", self.change, self.change_percent));
        }
        text
    }
}

/// Quote provider settings: base URL plus API key.
#[derive(Debug, Clone)]
pub struct PriceFeed {
    pub base_url: String,
    pub api_key: String,
}

impl PriceFeed {
    pub async fn fetch(&self, client: &reqwest::Client, ticker: &str) -> Result<LiveQuote> {
        let body: Value = client
            .get(&self.base_url)
            .query(&[("function", "GLOBAL_QUOTE"), ("symbol", ticker), ("apikey", self.api_key.as_str())])
            .timeout(QUOTE_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        LiveQuote::from_global_quote(&body, ticker)
    }
}
