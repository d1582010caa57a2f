use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use candle_core::Device;

use finrag_core::traits::TextGenerator;
use finrag_core::types::GenerationRequest;
use finrag_llm::{CausalLm, GenerationService, TokenCodec, SYSTEM_PROMPT};

/// Word-level codec: every whitespace-separated word gets an id on first sight.
struct WordCodec {
    vocab: Mutex<(HashMap<String, u32>, Vec<String>)>,
}

impl WordCodec {
    fn new() -> Self {
        let mut codec = (HashMap::new(), Vec::new());
        for w in ["</s>", "EBITDA", "is", "earnings", "before", "interest."] {
            codec.0.insert(w.to_string(), codec.1.len() as u32);
            codec.1.push(w.to_string());
        }
        Self { vocab: Mutex::new(codec) }
    }

    fn id(&self, word: &str) -> u32 {
        let vocab = self.vocab.lock().unwrap();
        vocab.0[word]
    }
}

impl TokenCodec for WordCodec {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let mut vocab = self.vocab.lock().unwrap();
        Ok(text.split_whitespace().map(|w| {
            if let Some(id) = vocab.0.get(w) { return *id; }
            let id = vocab.1.len() as u32;
            vocab.0.insert(w.to_string(), id);
            vocab.1.push(w.to_string());
            id
        }).collect())
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        let vocab = self.vocab.lock().unwrap();
        let words: Vec<&str> = ids
            .iter()
            .filter(|&&id| id != 0)
            .map(|&id| vocab.1.get(id as usize).map(String::as_str).ok_or_else(|| anyhow!("unknown id {id}")))
            .collect::<Result<_>>()?;
        Ok(words.join(" "))
    }

    fn eos_id(&self) -> Option<u32> { Some(0) }
}

type Calls = Arc<Mutex<Vec<(usize, usize, Option<u32>)>>>;

/// Appends a fixed continuation, honouring `max_new_tokens` and `eos`.
struct ScriptedLm {
    continuation: Vec<u32>,
    device: Device,
    calls: Calls,
}

impl CausalLm for ScriptedLm {
    fn generate_ids(&self, prompt_ids: &[u32], max_new_tokens: usize, eos: Option<u32>) -> Result<Vec<u32>> {
        self.calls.lock().unwrap().push((prompt_ids.len(), max_new_tokens, eos));
        let mut out = prompt_ids.to_vec();
        for &t in self.continuation.iter().take(max_new_tokens) {
            out.push(t);
            if Some(t) == eos { break; }
        }
        Ok(out)
    }

    fn device(&self) -> &Device { &self.device }
}

fn service(continuation_words: &[&str], with_eos: bool) -> (GenerationService, Calls) {
    let codec = WordCodec::new();
    let mut continuation: Vec<u32> = continuation_words.iter().map(|w| codec.id(w)).collect();
    if with_eos { continuation.push(0); }
    let calls = Calls::default();
    let model = ScriptedLm { continuation, device: Device::Cpu, calls: calls.clone() };
    (GenerationService::new(Box::new(codec), Box::new(model)), calls)
}

#[test]
fn answer_excludes_system_instruction_and_prompt() {
    let (svc, _) = service(&["EBITDA", "is", "earnings", "before", "interest."], true);
    let request = GenerationRequest { prompt: "What is EBITDA?".into(), max_tokens: 50, temperature: 0.0 };
    let answer = svc.generate(&request).expect("generate");

    assert_eq!(answer, "EBITDA is earnings before interest.");
    assert!(!answer.contains(SYSTEM_PROMPT));
    assert!(!answer.starts_with("What is EBITDA?"));
}

#[test]
fn max_tokens_and_eos_reach_the_model() {
    let (svc, calls) = service(&["EBITDA", "is", "earnings"], false);
    let request = GenerationRequest { prompt: "Define EBITDA".into(), max_tokens: 2, temperature: 0.0 };
    let answer = svc.generate(&request).expect("generate");

    assert_eq!(answer, "EBITDA is");
    let seen = calls.lock().unwrap();
    assert_eq!(seen.len(), 1);
    let words_in_prompt = SYSTEM_PROMPT.split_whitespace().count() + 2;
    assert_eq!(seen[0], (words_in_prompt, 2, Some(0)));
}

#[test]
fn temperature_does_not_change_the_answer() {
    let (svc, _) = service(&["EBITDA", "is", "earnings"], true);
    let greedy = svc.generate(&GenerationRequest { prompt: "q".into(), max_tokens: 8, temperature: 0.0 }).unwrap();
    let warm = svc.generate(&GenerationRequest { prompt: "q".into(), max_tokens: 8, temperature: 0.9 }).unwrap();
    assert_eq!(greedy, warm);
}

#[test]
fn custom_system_prompt_is_used() {
    let (svc, calls) = service(&["is"], true);
    let svc = svc.with_system_prompt("Be brief.");
    let answer = svc.generate(&GenerationRequest::new("EBITDA?")).unwrap();
    assert_eq!(answer, "is");
    assert_eq!(calls.lock().unwrap()[0].0, 3);
}

/// Whitespace word-level tokenizer with `</s>` registered as a special token.
fn word_level_tokenizer() -> tokenizers::Tokenizer {
    let json = r#"{
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [
            {"id": 0, "content": "</s>", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true}
        ],
        "normalizer": null,
        "pre_tokenizer": {"type": "Whitespace"},
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": {"</s>": 0, "<unk>": 1, "answer": 2, "briefly": 3, "what": 4, "is": 5, "ebitda": 6, "operating": 7, "profit": 8},
            "unk_token": "<unk>"
        }
    }"#;
    tokenizers::Tokenizer::from_bytes(json.as_bytes()).expect("tokenizer json")
}

#[test]
fn hub_tokenizer_encodes_decodes_and_finds_eos() {
    let tokenizer = word_level_tokenizer();
    assert_eq!(TokenCodec::encode(&tokenizer, "what is ebitda").unwrap(), vec![4, 5, 6]);
    assert_eq!(TokenCodec::decode(&tokenizer, &[4, 5, 6, 0]).unwrap(), "what is ebitda");
    assert_eq!(TokenCodec::eos_id(&tokenizer), Some(0));
}

#[test]
fn generation_with_hub_tokenizer_returns_only_the_continuation() {
    let calls = Calls::default();
    let model = ScriptedLm { continuation: vec![7, 8, 0, 6], device: Device::Cpu, calls: calls.clone() };
    let svc = GenerationService::new(Box::new(word_level_tokenizer()), Box::new(model)).with_system_prompt("answer briefly");

    let answer = svc.generate(&GenerationRequest::new("what is ebitda")).expect("generate");
    assert_eq!(answer, "operating profit");
    assert!(!answer.contains("</s>"));
    assert_eq!(calls.lock().unwrap()[0], (5, 256, Some(0)));
}
