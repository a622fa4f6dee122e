//! TOML configuration.
//!
//! Every section is optional and falls back to the defaults below, so an
//! empty file (or no file at all, see [`load_or_default`]) is a valid
//! configuration. Values are checked once in [`validate`]; the rest of the
//! crate trusts them.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use fingenius_core::split::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_SEPARATORS};
use fingenius_core::RecursiveSplitter;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub loaders: LoadersConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    /// Guard read-merge-write with `<path>.lock`.
    #[serde(default = "default_true")]
    pub lock: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            lock: true,
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("./data/docs.fgvs")
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_separators")]
    pub separators: Vec<String>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            separators: default_separators(),
        }
    }
}

impl ChunkingConfig {
    pub fn splitter(&self) -> Result<RecursiveSplitter> {
        RecursiveSplitter::new(self.separators.clone(), self.chunk_size, self.chunk_overlap)
            .context("invalid [chunking] settings")
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}
fn default_separators() -> Vec<String> {
    DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Required for `openai`; derived from the model name for `local`.
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL of an OpenAI-compatible embeddings API.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_embedding_model(),
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            url: None,
            api_key_env: default_openai_key_env(),
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_embedding_model() -> String {
    "all-minilm-l6-v2".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { k: default_k() }
    }
}

fn default_k() -> usize {
    4
}

/// Chat-completions settings.
///
/// `model`, `base_url` and `api_key_env` fall back to the provider's
/// defaults when unset (see [`GenerationConfig::model`] and friends).
#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: None,
            base_url: None,
            api_key_env: None,
            temperature: 0.0,
            timeout_secs: default_generation_timeout(),
        }
    }
}

/// `(model, base_url, api_key_env)` for each known generation provider.
const GENERATION_PROVIDERS: &[(&str, (&str, &str, &str))] = &[
    (
        "groq",
        (
            "llama-3.3-70b-versatile",
            "https://api.groq.com/openai/v1",
            "GROQ_API_KEY",
        ),
    ),
    (
        "openai",
        ("gpt-4o-mini", "https://api.openai.com/v1", "OPENAI_API_KEY"),
    ),
];

impl GenerationConfig {
    fn provider_defaults(&self) -> (&'static str, &'static str, &'static str) {
        GENERATION_PROVIDERS
            .iter()
            .find(|(name, _)| *name == self.provider)
            .map(|(_, defaults)| *defaults)
            .unwrap_or(GENERATION_PROVIDERS[0].1)
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(self.provider_defaults().0)
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(self.provider_defaults().1)
    }

    pub fn api_key_env(&self) -> &str {
        self.api_key_env
            .as_deref()
            .unwrap_or(self.provider_defaults().2)
    }
}

fn default_generation_provider() -> String {
    "groq".to_string()
}
fn default_generation_timeout() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoadersConfig {
    #[serde(default = "default_loader_order")]
    pub order: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for LoadersConfig {
    fn default() -> Self {
        Self {
            order: default_loader_order(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_loader_order() -> Vec<String> {
    vec!["pdf".to_string(), "html".to_string()]
}
fn default_user_agent() -> String {
    format!("fingenius/{}", env!("CARGO_PKG_VERSION"))
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SourcesConfig {
    #[serde(default)]
    pub mongodb: MongoSourceConfig,
    #[serde(default)]
    pub directory: DirectorySourceConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MongoSourceConfig {
    /// Environment variable holding the connection string.
    #[serde(default = "default_mongo_uri_env")]
    pub uri_env: String,
    #[serde(default = "default_mongo_database")]
    pub database: String,
    #[serde(default = "default_mongo_collection")]
    pub collection: String,
    #[serde(default = "default_mongo_field")]
    pub field: String,
}

impl Default for MongoSourceConfig {
    fn default() -> Self {
        Self {
            uri_env: default_mongo_uri_env(),
            database: default_mongo_database(),
            collection: default_mongo_collection(),
            field: default_mongo_field(),
        }
    }
}

fn default_mongo_uri_env() -> String {
    "MONGO_URI".to_string()
}
fn default_mongo_database() -> String {
    "test".to_string()
}
fn default_mongo_collection() -> String {
    "files".to_string()
}
fn default_mongo_field() -> String {
    "url".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct DirectorySourceConfig {
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for DirectorySourceConfig {
    fn default() -> Self {
        Self {
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

fn default_include_globs() -> Vec<String> {
    ["**/*.pdf", "**/*.html", "**/*.htm", "**/*.txt", "**/*.md"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

pub const LOADER_NAMES: &[&str] = &["pdf", "html"];

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    validate(&config)?;
    Ok(config)
}

/// Load `path` if it exists, otherwise validated defaults.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        let config = Config::default();
        validate(&config)?;
        Ok(config)
    }
}

pub fn validate(config: &Config) -> Result<()> {
    // Chunking
    config.chunking.splitter()?;

    // Embedding
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }
    match config.embedding.provider.as_str() {
        "local" => {}
        "openai" => {
            if config.embedding.dims.unwrap_or(0) == 0 {
                bail!("embedding.dims must be > 0 when provider is 'openai'");
            }
        }
        other => bail!(
            "Unknown embedding provider: '{}'. Must be local or openai.",
            other
        ),
    }
    if config.embedding.dims == Some(0) {
        bail!("embedding.dims must be > 0");
    }

    // Retrieval
    if config.retrieval.k < 1 {
        bail!("retrieval.k must be >= 1");
    }

    // Generation
    if !GENERATION_PROVIDERS
        .iter()
        .any(|(name, _)| *name == config.generation.provider)
    {
        bail!(
            "Unknown generation provider: '{}'. Must be groq or openai.",
            config.generation.provider
        );
    }
    if !(0.0..=2.0).contains(&config.generation.temperature) {
        bail!("generation.temperature must be in [0.0, 2.0]");
    }

    // Loaders
    if config.loaders.order.is_empty() {
        bail!("loaders.order must name at least one loader");
    }
    for name in &config.loaders.order {
        if !LOADER_NAMES.contains(&name.as_str()) {
            bail!(
                "Unknown loader: '{}'. Available: {}",
                name,
                LOADER_NAMES.join(", ")
            );
        }
    }

    Ok(())
}
