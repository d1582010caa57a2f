use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use candle_transformers::models::llama::{Llama, LlamaConfig};
use tempfile::TempDir;

use finrag_llm::adapter::AdapterStatus;
use finrag_llm::loader::{apply_adapter, default_strategies, load_with_chain, LoadOptions};
use finrag_llm::source::{ModelFiles, ModelRepo};
use finrag_llm::{FallbackChain, Outcome};

const TINY_CONFIG: &str = r#"{
    "hidden_size": 16,
    "intermediate_size": 32,
    "vocab_size": 32,
    "num_hidden_layers": 1,
    "num_attention_heads": 2,
    "num_key_value_heads": 2,
    "rms_norm_eps": 1e-5,
    "rope_theta": 10000.0,
    "max_position_embeddings": 64,
    "tie_word_embeddings": false,
    "bos_token_id": 1,
    "eos_token_id": 2
}"#;

/// Write a randomly initialised one-layer llama as a local model directory.
fn write_tiny_model(dir: &Path) {
    let config: LlamaConfig = serde_json::from_str(TINY_CONFIG).unwrap();
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
    Llama::load(vb, &config.into_config(false)).unwrap();
    varmap.save(dir.join("model.safetensors")).unwrap();
    fs::write(dir.join("config.json"), TINY_CONFIG).unwrap();
    // Only its presence is checked while resolving files.
    fs::write(dir.join("tokenizer.json"), "{}").unwrap();
}

fn write_adapter(dir: &Path) {
    fs::write(
        dir.join("adapter_config.json"),
        r#"{"r": 2, "lora_alpha": 4, "target_modules": ["q_proj"]}"#,
    ).unwrap();
    let dev = Device::Cpu;
    let mut tensors = HashMap::new();
    let stem = "base_model.model.model.layers.0.self_attn.q_proj";
    tensors.insert(format!("{stem}.lora_A.weight"), Tensor::ones((2, 16), DType::F32, &dev).unwrap());
    tensors.insert(format!("{stem}.lora_B.weight"), Tensor::ones((16, 2), DType::F32, &dev).unwrap());
    candle_core::safetensors::save(&tensors, dir.join("adapter_model.safetensors")).unwrap();
}

fn options(dir: &Path, offload: &Path) -> LoadOptions {
    LoadOptions {
        model_id: dir.display().to_string(),
        revision: "main".into(),
        offload_dir: offload.to_path_buf(),
        gguf_file: None,
    }
}

// Built without the `cuda`/`metal` features there is no accelerator, and the
// directory publishes no GGUF file: only the CPU strategy can succeed.
#[test]
fn cpu_fallback_without_gpu_or_quantized_weights() {
    let tmp = TempDir::new().unwrap();
    write_tiny_model(tmp.path());
    let opts = options(tmp.path(), &tmp.path().join("offload"));

    let files = Arc::new(ModelFiles::from_repo(ModelRepo::local(tmp.path()), "main").unwrap());
    let chain = FallbackChain::new(default_strategies(&files, &opts));
    let (model, report) = load_with_chain(&opts.model_id, &chain, |base| apply_adapter(base, &files.repo)).expect("cpu load");

    assert_eq!(report.strategy, "cpu");
    let outcomes: Vec<(&str, &Outcome)> = report.attempts.iter().map(|a| (a.strategy, &a.outcome)).collect();
    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0].0, "quantized-4bit");
    assert!(matches!(outcomes[0].1, Outcome::Failed(r) if r.contains("GGUF")));
    assert!(matches!(outcomes[1], ("gpu-offload", Outcome::Skipped(_))));
    assert_eq!(outcomes[2], ("cpu", &Outcome::Loaded));
    assert!(!tmp.path().join("offload").exists(), "skipped GPU strategy must not create the offload dir");
    assert!(matches!(report.adapter, AdapterStatus::NotApplied { .. }));

    let ids = model.generate_ids(&[1, 3, 5], 4, None).expect("generate");
    assert_eq!(ids.len(), 7);
    assert_eq!(&ids[..3], &[1, 3, 5]);
    assert!(ids.iter().all(|&t| t < 32));
}

#[test]
fn adapter_published_with_the_model_is_merged() {
    let tmp = TempDir::new().unwrap();
    write_tiny_model(tmp.path());
    write_adapter(tmp.path());
    let opts = options(tmp.path(), &tmp.path().join("offload"));

    let files = Arc::new(ModelFiles::from_repo(ModelRepo::local(tmp.path()), "main").unwrap());
    let chain = FallbackChain::new(default_strategies(&files, &opts));
    let (_model, report) = load_with_chain(&opts.model_id, &chain, |base| apply_adapter(base, &files.repo)).expect("load");

    assert_eq!(report.adapter, AdapterStatus::Applied { rank: 2, alpha: 4.0, merged: 1 });
}

#[test]
fn broken_adapter_falls_back_to_base_model() {
    let tmp = TempDir::new().unwrap();
    write_tiny_model(tmp.path());
    fs::write(tmp.path().join("adapter_config.json"), r#"{"r": 2, "lora_alpha": 4}"#).unwrap();
    let opts = options(tmp.path(), &tmp.path().join("offload"));

    let files = Arc::new(ModelFiles::from_repo(ModelRepo::local(tmp.path()), "main").unwrap());
    let chain = FallbackChain::new(default_strategies(&files, &opts));
    let (model, report) = load_with_chain(&opts.model_id, &chain, |base| apply_adapter(base, &files.repo)).expect("load");

    match &report.adapter {
        AdapterStatus::NotApplied { reason } => assert!(reason.contains("adapter_model.safetensors"), "{reason}"),
        other => panic!("expected NotApplied, got {other:?}"),
    }
    assert!(model.generate_ids(&[1], 1, None).is_ok());
}

#[test]
fn missing_weights_fail_every_strategy() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("config.json"), TINY_CONFIG).unwrap();
    fs::write(tmp.path().join("tokenizer.json"), "{}").unwrap();
    let opts = options(tmp.path(), &tmp.path().join("offload"));

    let files = Arc::new(ModelFiles::from_repo(ModelRepo::local(tmp.path()), "main").unwrap());
    let chain = FallbackChain::new(default_strategies(&files, &opts));
    let err = load_with_chain(&opts.model_id, &chain, |base| apply_adapter(base, &files.repo)).err().expect("must fail");
    assert!(format!("{err:#}").contains("cpu"), "{err:#}");
}

#[test]
fn adapter_repository_without_base_pointer_is_rejected() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("adapter_config.json"), r#"{"r": 8, "lora_alpha": 16}"#).unwrap();
    assert!(ModelFiles::from_repo(ModelRepo::local(tmp.path()), "main").is_err());
}

#[test]
#[ignore = "downloads a 1.1B model from the Hugging Face hub"]
fn loads_default_model_from_hub() {
    let tmp = TempDir::new().unwrap();
    let opts = LoadOptions {
        model_id: finrag_core::config::DEFAULT_MODEL_ID.into(),
        revision: "main".into(),
        offload_dir: tmp.path().join("offload"),
        gguf_file: None,
    };
    let handle = finrag_llm::load_model(&opts).expect("load");
    assert!(!handle.report.attempts.is_empty());
}
