//! Shared start-up for the finrag binaries.
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins; otherwise `info` for everything.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Load layered configuration, reporting failures on stderr before tracing
/// is guaranteed to be up.
pub fn load_config() -> anyhow::Result<finrag_core::config::Config> {
    finrag_core::config::Config::load().map_err(|e| {
        eprintln!("Error loading config: {e}");
        e
    })
}
