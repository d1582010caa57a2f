//! Lightweight configuration loader and path expansion.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (`__` separates nested keys, e.g. `APP_MODEL_SERVER__PORT`). Each service
//! then extracts its own section, with a few raw environment variables
//! (`MODEL_ID`, `OFFLOAD_DIR`, `RETRIEVER_URL`, ...) taking precedence.
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

pub const DEFAULT_MODEL_ID: &str = "Iconic112/finance-tinyllama-qlora";
pub const DEFAULT_OFFLOAD_DIR: &str = "./offload";

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment })
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Extract a whole section, letting the listed raw env vars override it.
    /// A missing section yields the type's serde defaults.
    fn section<T>(&self, name: &str, raw_env: &[&str]) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .focus(name)
            .merge(Env::raw().only(raw_env))
            .extract()
            .map_err(|e| anyhow::anyhow!("Invalid '{}' settings: {}", name, e))
    }

    pub fn model_server(&self) -> anyhow::Result<ModelServerSettings> {
        let mut settings: ModelServerSettings =
            self.section("model_server", &["MODEL_ID", "OFFLOAD_DIR"])?;
        settings.offload_dir = expand_path(settings.offload_dir.to_string_lossy());
        if settings.model_id.trim().is_empty() {
            return Err(crate::error::Error::InvalidConfig("model_id must not be empty".into()).into());
        }
        Ok(settings)
    }

    pub fn retriever(&self) -> anyhow::Result<RetrieverSettings> {
        let mut settings: RetrieverSettings = self.section("retriever", &[])?;
        settings.corpus_path = settings.corpus_path.map(|p| expand_path(p.to_string_lossy()));
        Ok(settings)
    }

    pub fn gateway(&self) -> anyhow::Result<GatewaySettings> {
        self.section(
            "gateway",
            &[
                "PORT",
                "RETRIEVER_URL",
                "MODEL_SERVER_URL",
                "OLLAMA_URL",
                "OLLAMA_MODEL",
                "STOCK_API_KEY",
                "STOCK_API_BASE",
            ],
        )
    }
}

/// Model server settings. `MODEL_ID` and `OFFLOAD_DIR` override the file values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelServerSettings {
    pub model_id: String,
    pub offload_dir: PathBuf,
    pub revision: String,
    /// Explicit 4-bit GGUF file name inside the model repository.
    pub gguf_file: Option<String>,
    pub host: String,
    pub port: u16,
}

impl Default for ModelServerSettings {
    fn default() -> Self {
        Self {
            model_id: DEFAULT_MODEL_ID.to_string(),
            offload_dir: PathBuf::from(DEFAULT_OFFLOAD_DIR),
            revision: "main".to_string(),
            gguf_file: None,
            host: "0.0.0.0".to_string(),
            port: 8001,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverSettings {
    pub host: String,
    pub port: u16,
    pub default_k: usize,
    /// JSON file of documents or a directory of `.txt` files. `None` serves
    /// the built-in demo corpus.
    pub corpus_path: Option<PathBuf>,
}

impl Default for RetrieverSettings {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8002, default_k: crate::types::DEFAULT_K, corpus_path: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    pub host: String,
    pub port: u16,
    pub retriever_url: String,
    pub model_server_url: String,
    pub ollama_url: String,
    pub ollama_model: String,
    pub retriever_timeout_ms: u64,
    pub ollama_timeout_ms: u64,
    pub primary_timeout_ms: u64,
    pub stock_api_key: Option<String>,
    pub stock_api_base: String,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            retriever_url: "http://localhost:8002/retrieve".to_string(),
            model_server_url: "http://localhost:8001/generate".to_string(),
            ollama_url: "http://localhost:11434/api/generate".to_string(),
            ollama_model: "gemma3".to_string(),
            retriever_timeout_ms: 4_000,
            ollama_timeout_ms: 45_000,
            primary_timeout_ms: 120_000,
            stock_api_key: None,
            stock_api_base: "https://www.alphavantage.co/query".to_string(),
        }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
