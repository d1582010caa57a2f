use std::fs;

use figment::{Figment, Jail};
use figment::providers::{Format, Toml};
use tempfile::TempDir;

use finrag_core::config::{Config, DEFAULT_MODEL_ID};
use finrag_core::corpus::{demo_corpus, load_corpus};
use finrag_core::types::{GenerationRequest, RetrieveRequest};

#[test]
fn demo_corpus_has_four_documents_in_order() {
    let ids: Vec<String> = demo_corpus().into_iter().map(|d| d.id).collect();
    assert_eq!(ids, ["doc1", "doc2", "doc3", "doc4"]);
}

#[test]
fn load_corpus_from_txt_directory() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("b.txt"), "Bond yields rise with inflation.\n").unwrap();
    fs::write(dir.join("a.txt"), "EBITDA margin compares profitability.").unwrap();
    fs::write(dir.join("notes.md"), "ignored").unwrap();

    let docs = load_corpus(Some(dir)).expect("corpus");
    assert_eq!(docs.len(), 2, "only .txt files become documents");
    assert_eq!(docs[0].id, "a");
    assert_eq!(docs[1].text, "Bond yields rise with inflation.");
}

#[test]
fn load_corpus_from_json_file() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("corpus.json");
    fs::write(&path, r#"[{"id":"x1","text":"repo rate"}]"#).unwrap();
    let docs = load_corpus(Some(&path)).expect("corpus");
    assert_eq!(docs[0].id, "x1");
}

#[test]
fn empty_corpus_is_rejected() {
    let tmp = TempDir::new().unwrap();
    assert!(load_corpus(Some(tmp.path())).is_err());
}

#[test]
fn request_defaults_apply() {
    let r: RetrieveRequest = serde_json::from_str(r#"{"query":"ebitda"}"#).unwrap();
    assert_eq!(r.k, None);
    assert_eq!(r.k_or(4), 4);
    let r: RetrieveRequest = serde_json::from_str(r#"{"query":"ebitda","k":-3}"#).unwrap();
    assert_eq!(r.k_or(4), -3);
    let g: GenerationRequest = serde_json::from_str(r#"{"prompt":"What is EBITDA?"}"#).unwrap();
    assert_eq!(g.max_tokens, 256);
    assert_eq!(g.temperature, 0.0);
}

#[test]
fn model_server_defaults_and_raw_env_override() {
    Jail::expect_with(|jail| {
        let config = Config::from_figment(Figment::new());
        let settings = config.model_server().expect("settings");
        assert_eq!(settings.model_id, DEFAULT_MODEL_ID);
        assert_eq!(settings.port, 8001);

        jail.set_env("MODEL_ID", "TinyLlama/TinyLlama-1.1B-Chat-v1.0");
        jail.set_env("OFFLOAD_DIR", "/var/tmp/offload");
        let settings = config.model_server().expect("settings");
        assert_eq!(settings.model_id, "TinyLlama/TinyLlama-1.1B-Chat-v1.0");
        assert_eq!(settings.offload_dir, std::path::PathBuf::from("/var/tmp/offload"));
        Ok(())
    });
}

#[test]
fn sections_read_from_toml() {
    Jail::expect_with(|jail| {
        jail.create_file("config.toml", "[retriever]\nport = 9100\ndefault_k = 2\n\n[gateway]\nollama_model = \"llama3\"\n")?;
        let config = Config::from_figment(Figment::new().merge(Toml::file("config.toml")));
        let retriever = config.retriever().expect("retriever");
        assert_eq!(retriever.port, 9100);
        assert_eq!(retriever.default_k, 2);
        assert!(retriever.corpus_path.is_none());
        let gateway = config.gateway().expect("gateway");
        assert_eq!(gateway.ollama_model, "llama3");
        assert_eq!(gateway.retriever_timeout_ms, 4_000);
        Ok(())
    });
}

#[test]
fn offload_dir_expands_environment_variables() {
    Jail::expect_with(|jail| {
        jail.set_env("FINRAG_HOME", "/srv/finrag");
        jail.set_env("OFFLOAD_DIR", "$FINRAG_HOME/offload");
        let settings = Config::from_figment(Figment::new()).model_server().expect("settings");
        assert_eq!(settings.offload_dir, std::path::PathBuf::from("/srv/finrag/offload"));
        Ok(())
    });
}
