use std::fmt;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

/// API key wrapper that never leaks through Debug or Display.
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub llm: LlmConfig,
    pub chunking: ChunkingConfig,
    pub store: StoreConfig,
    pub runner: RunnerConfig,
    pub query: QueryConfig,
    #[serde(skip)]
    pub secrets: Secrets,
}

#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub openai_api_key: Option<Secret>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub embedding_model: String,
    /// Vector length produced by `embedding_model`.
    pub dimensions: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            embedding_model: "text-embedding-3-large".into(),
            dimensions: 3072,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub qdrant_url: String,
    pub collection: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            qdrant_url: "http://localhost:6334".into(),
            collection: "documents".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerConfig {
    /// Step-result database. `:memory:` keeps it process-local.
    pub sqlite_path: String,
    pub max_retries: u32,
    pub base_delay_secs: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            sqlite_path: "sibyl-steps.db".into(),
            max_retries: 3,
            base_delay_secs: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueryConfig {
    pub top_k: u64,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            temperature: 0.2,
            max_tokens: 1024,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("SIBYL_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("SIBYL_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("SIBYL_EMBEDDING_MODEL") {
            self.llm.embedding_model = v;
        }
        if let Ok(v) = std::env::var("SIBYL_EMBEDDING_DIMENSIONS")
            && let Ok(d) = v.parse::<usize>()
        {
            self.llm.dimensions = d;
        }
        if let Ok(v) = std::env::var("SIBYL_QDRANT_URL") {
            self.store.qdrant_url = v;
        }
        if let Ok(v) = std::env::var("SIBYL_COLLECTION") {
            self.store.collection = v;
        }
        if let Ok(v) = std::env::var("SIBYL_SQLITE_PATH") {
            self.runner.sqlite_path = v;
        }
        if let Ok(v) = std::env::var("SIBYL_TOP_K")
            && let Ok(k) = v.parse::<u64>()
        {
            self.query.top_k = k;
        }
        if let Ok(v) = std::env::var("SIBYL_OPENAI_API_KEY") {
            self.secrets.openai_api_key = Some(Secret::new(v));
        }
    }
}
