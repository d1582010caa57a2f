//! Locating model files on disk or on the Hugging Face hub.
//!
//! A model id that names an existing directory is read locally; anything else
//! is fetched (and cached) through `hf-hub`. Adapter-only repositories, which
//! carry `adapter_config.json` but no `config.json`, resolve their base model
//! from `base_model_name_or_path`.

use anyhow::{Context, Result, anyhow};
use hf_hub::api::sync::{Api, ApiRepo};
use hf_hub::{Repo, RepoType};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

enum RepoKind {
    Local(PathBuf),
    Hub(ApiRepo),
}

pub struct ModelRepo {
    id: String,
    kind: RepoKind,
}

impl ModelRepo {
    pub fn open(id: &str, revision: &str) -> Result<Self> {
        let local = Path::new(id);
        if local.is_dir() {
            debug!(dir = %local.display(), "using local model directory");
            return Ok(Self::local(local));
        }
        let api = Api::new().context("initialising hf-hub client")?;
        let repo = api.repo(Repo::with_revision(id.to_string(), RepoType::Model, revision.to_string()));
        Ok(Self { id: id.to_string(), kind: RepoKind::Hub(repo) })
    }

    pub fn local(dir: &Path) -> Self {
        Self { id: dir.display().to_string(), kind: RepoKind::Local(dir.to_path_buf()) }
    }

    pub fn id(&self) -> &str { &self.id }

    /// Path to `file`, downloading it first for hub repositories.
    pub fn get(&self, file: &str) -> Result<PathBuf> {
        match &self.kind {
            RepoKind::Local(dir) => {
                let p = dir.join(file);
                if p.is_file() { Ok(p) } else { Err(anyhow!("{} not found in {}", file, dir.display())) }
            }
            RepoKind::Hub(repo) => repo.get(file).with_context(|| format!("fetching {} from {}", file, self.id)),
        }
    }

    pub fn has(&self, file: &str) -> bool { self.get(file).is_ok() }

    /// Every file name the repository lists.
    pub fn files(&self) -> Result<Vec<String>> {
        match &self.kind {
            RepoKind::Local(dir) => {
                let mut names = Vec::new();
                for entry in std::fs::read_dir(dir)? {
                    let entry = entry?;
                    if entry.file_type()?.is_file() { names.push(entry.file_name().to_string_lossy().to_string()); }
                }
                names.sort();
                Ok(names)
            }
            RepoKind::Hub(repo) => Ok(repo.info()?.siblings.into_iter().map(|s| s.rfilename).collect()),
        }
    }

    pub fn read_json<T: serde::de::DeserializeOwned>(&self, file: &str) -> Result<T> {
        let path = self.get(file)?;
        let raw = std::fs::read_to_string(&path)?;
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
    }
}

#[derive(Debug, Deserialize)]
struct AdapterPointer {
    base_model_name_or_path: Option<String>,
}

/// The repositories behind one model id.
pub struct ModelFiles {
    /// The repository named by the model id (may be an adapter repository).
    pub repo: ModelRepo,
    /// Where the base config and weights live; `None` when they are in `repo`.
    pub base: Option<ModelRepo>,
    pub tokenizer: PathBuf,
}

impl ModelFiles {
    pub fn resolve(model_id: &str, revision: &str) -> Result<Self> {
        let repo = ModelRepo::open(model_id, revision)?;
        Self::from_repo(repo, revision)
    }

    pub fn from_repo(repo: ModelRepo, revision: &str) -> Result<Self> {
        let base = if repo.has("config.json") {
            None
        } else {
            let pointer: AdapterPointer = repo
                .read_json("adapter_config.json")
                .with_context(|| format!("{} has neither config.json nor adapter_config.json", repo.id()))?;
            let base_id = pointer
                .base_model_name_or_path
                .ok_or_else(|| anyhow!("adapter_config.json in {} names no base model", repo.id()))?;
            info!(adapter = repo.id(), base = %base_id, "adapter repository, resolving base model");
            Some(ModelRepo::open(&base_id, revision)?)
        };
        let tokenizer = match repo.get("tokenizer.json") {
            Ok(p) => p,
            Err(e) => match &base {
                Some(b) => b.get("tokenizer.json")?,
                None => return Err(e),
            },
        };
        Ok(Self { repo, base, tokenizer })
    }

    /// Repository holding `config.json` and the dense weights.
    pub fn weights_repo(&self) -> &ModelRepo { self.base.as_ref().unwrap_or(&self.repo) }

    /// Repositories to search for files, model id first.
    pub fn search_order(&self) -> impl Iterator<Item = &ModelRepo> {
        std::iter::once(&self.repo).chain(self.base.iter())
    }
}
