//! TOML configuration parsing and validation.
//!
//! Every tunable has a `default_*` function so a config file only needs to
//! mention the keys it changes. See `config/travelrag.example.toml`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Placeholder values that count as "no API key configured".
const PLACEHOLDER_KEYS: &[&str] = &["your-api-key-here", "sk-...", "changeme"];

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub collector: CollectorConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: default_data_dir(),
            include_globs: default_include_globs(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./travel_data")
}
fn default_include_globs() -> Vec<String> {
    vec!["**/*.txt".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// `"window"` (fixed character windows) or `"sections"` (heading-aligned).
    #[serde(default = "default_strategy")]
    pub strategy: String,
    /// Maximum characters per chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Characters shared by consecutive windows.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Sections shorter than this are dropped (`sections` strategy only).
    #[serde(default = "default_min_chunk_size")]
    pub min_chunk_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            min_chunk_size: default_min_chunk_size(),
        }
    }
}

fn default_strategy() -> String {
    "window".to_string()
}
fn default_chunk_size() -> usize {
    500
}
fn default_chunk_overlap() -> usize {
    50
}
fn default_min_chunk_size() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the `ollama` provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    32
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// `"cosine"` or `"euclidean"`.
    #[serde(default = "default_metric")]
    pub metric: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            metric: default_metric(),
        }
    }
}

fn default_top_k() -> usize {
    3
}
fn default_metric() -> String {
    "cosine".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct IndexConfig {
    /// Where the built index is cached as JSON. No caching when unset.
    #[serde(default)]
    pub cache_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    /// Falls back to the `OPENAI_API_KEY` environment variable when empty.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_llm_temperature")]
    pub temperature: f32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            api_key: None,
            model: default_llm_model(),
            base_url: default_llm_base_url(),
            max_tokens: default_llm_max_tokens(),
            temperature: default_llm_temperature(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_llm_provider() -> String {
    "openai".to_string()
}
fn default_llm_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_llm_max_tokens() -> usize {
    500
}
fn default_llm_temperature() -> f32 {
    0.7
}
fn default_llm_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8501".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct CollectorConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Pause between two article requests.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_collector_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_wikipedia_api")]
    pub wikipedia_api: String,
    #[serde(default = "default_wikivoyage_api")]
    pub wikivoyage_api: String,
    #[serde(default = "default_wikipedia_titles")]
    pub wikipedia: Vec<String>,
    #[serde(default = "default_wikivoyage_titles")]
    pub wikivoyage: Vec<String>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            delay_ms: default_delay_ms(),
            timeout_secs: default_collector_timeout_secs(),
            wikipedia_api: default_wikipedia_api(),
            wikivoyage_api: default_wikivoyage_api(),
            wikipedia: default_wikipedia_titles(),
            wikivoyage: default_wikivoyage_titles(),
        }
    }
}

fn default_user_agent() -> String {
    format!(
        "TravelRag/{} (educational retrieval demo)",
        env!("CARGO_PKG_VERSION")
    )
}
fn default_delay_ms() -> u64 {
    1000
}
fn default_collector_timeout_secs() -> u64 {
    30
}
fn default_wikipedia_api() -> String {
    "https://en.wikipedia.org/w/api.php".to_string()
}
fn default_wikivoyage_api() -> String {
    "https://en.wikivoyage.org/w/api.php".to_string()
}
fn default_wikipedia_titles() -> Vec<String> {
    ["Travel", "Tourism"].iter().map(|s| s.to_string()).collect()
}
fn default_wikivoyage_titles() -> Vec<String> {
    [
        "Paris",
        "Tokyo",
        "London",
        "Rome",
        "Barcelona",
        "Europe",
        "Asia",
        "Backpacking",
        "Budget travel",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Config {
    /// All-defaults configuration for commands that can run without a file.
    pub fn minimal() -> Self {
        Self {
            data: DataConfig::default(),
            chunking: ChunkingConfig::default(),
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
            index: IndexConfig::default(),
            llm: LlmConfig::default(),
            server: ServerConfig::default(),
            collector: CollectorConfig::default(),
        }
    }
}

impl LlmConfig {
    /// The API key from config or environment, if one that is not a
    /// placeholder is present.
    pub fn effective_api_key(&self) -> Option<String> {
        pick_api_key(
            self.api_key.as_deref(),
            std::env::var("OPENAI_API_KEY").ok().as_deref(),
        )
    }
}

/// A placeholder in the config file does not shadow a real key in the
/// environment.
fn pick_api_key(from_config: Option<&str>, from_env: Option<&str>) -> Option<String> {
    let usable = |k: &str| {
        let k = k.trim();
        (!k.is_empty() && !PLACEHOLDER_KEYS.contains(&k)).then(|| k.to_string())
    };
    from_config.and_then(usable).or_else(|| from_env.and_then(usable))
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).with_context(|| {
        format!(
            "Failed to read config file: {} (copy config/travelrag.example.toml to get started)",
            path.display()
        )
    })?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        anyhow::bail!(
            "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
            config.chunking.chunk_overlap,
            config.chunking.chunk_size
        );
    }
    match config.chunking.strategy.as_str() {
        "window" | "sections" => {}
        other => anyhow::bail!(
            "Unknown chunking strategy: '{}'. Must be window or sections.",
            other
        ),
    }

    // Validate retrieval
    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    match config.retrieval.metric.as_str() {
        "cosine" | "euclidean" => {}
        other => anyhow::bail!(
            "Unknown retrieval metric: '{}'. Must be cosine or euclidean.",
            other
        ),
    }

    // Validate embedding
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }
    match config.embedding.provider.as_str() {
        "local" | "hashing" => {}
        "openai" | "ollama" => {
            if config.embedding.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                anyhow::bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be local, openai, ollama, or hashing.",
            other
        ),
    }
    if config.embedding.dims == Some(0) {
        anyhow::bail!("embedding.dims must be > 0");
    }

    // Validate llm
    match config.llm.provider.as_str() {
        "openai" => {}
        other => anyhow::bail!("Unknown llm provider: '{}'. Must be openai.", other),
    }
    if !(0.0..=2.0).contains(&config.llm.temperature) {
        anyhow::bail!("llm.temperature must be in [0.0, 2.0]");
    }

    Ok(())
}
