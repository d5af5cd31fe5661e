//! TOML configuration.
//!
//! Every service parameter the pipeline needs (run directory layout,
//! platform endpoints, index and model settings) lives in one [`Config`]
//! that is threaded through constructors. Secrets are not stored here; the
//! clients read them from the environment when they are built.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub runs: RunsConfig,
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    #[serde(default)]
    pub platform: PlatformConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub answer: AnswerConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RunsConfig {
    pub root: PathBuf,
    /// How a run identifier is derived when the caller does not pass one.
    #[serde(default)]
    pub key: RunKeyStrategy,
    #[serde(default)]
    pub search_cache: SearchCacheMode,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunKeyStrategy {
    /// Hash of the normalized scope and topic.
    #[default]
    Content,
    /// Local wall-clock time truncated to the minute.
    Minute,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SearchCacheMode {
    /// One search artifact per distinct query text.
    #[default]
    PerQuery,
    /// One search artifact per run; its presence also skips indexing.
    PerRun,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AcquisitionConfig {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default = "default_max_comments")]
    pub max_comments: usize,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            max_comments: default_max_comments(),
        }
    }
}

fn default_limit() -> usize {
    10
}
fn default_max_comments() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct PlatformConfig {
    #[serde(default = "default_platform_provider")]
    pub provider: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_reddit_api_base")]
    pub api_base: String,
    #[serde(default = "default_reddit_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            provider: default_platform_provider(),
            user_agent: default_user_agent(),
            api_base: default_reddit_api_base(),
            auth_url: default_reddit_auth_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_platform_provider() -> String {
    "reddit".to_string()
}
fn default_user_agent() -> String {
    format!("thread-harvest/{}", env!("CARGO_PKG_VERSION"))
}
fn default_reddit_api_base() -> String {
    "https://oauth.reddit.com".to_string()
}
fn default_reddit_auth_url() -> String {
    "https://www.reddit.com/api/v1/access_token".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_provider")]
    pub provider: String,
    #[serde(default = "default_index_name")]
    pub name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_control_url")]
    pub control_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            provider: default_index_provider(),
            name: default_index_name(),
            namespace: default_namespace(),
            batch_size: default_batch_size(),
            top_k: default_top_k(),
            control_url: default_control_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_index_provider() -> String {
    "pinecone".to_string()
}
fn default_index_name() -> String {
    "mcp-test".to_string()
}
fn default_namespace() -> String {
    "__default__".to_string()
}
fn default_batch_size() -> usize {
    95
}
fn default_top_k() -> usize {
    50
}
fn default_control_url() -> String {
    "https://api.pinecone.io".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnswerConfig {
    #[serde(default = "default_answer_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_gemini_api_base")]
    pub api_base: String,
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
    #[serde(default = "default_answer_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            provider: default_answer_provider(),
            model: default_model(),
            api_base: default_gemini_api_base(),
            max_context_chars: default_max_context_chars(),
            timeout_secs: default_answer_timeout_secs(),
        }
    }
}

fn default_answer_provider() -> String {
    "disabled".to_string()
}
fn default_model() -> String {
    "gemini-2.5-flash-preview-05-20".to_string()
}
fn default_gemini_api_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_max_context_chars() -> usize {
    12_000
}
fn default_answer_timeout_secs() -> u64 {
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
    "127.0.0.1:8001".to_string()
}

impl Config {
    /// A config with every section at its default and runs stored under `root`.
    pub fn minimal(root: impl Into<PathBuf>) -> Self {
        Self {
            runs: RunsConfig {
                root: root.into(),
                key: RunKeyStrategy::default(),
                search_cache: SearchCacheMode::default(),
            },
            acquisition: AcquisitionConfig::default(),
            platform: PlatformConfig::default(),
            index: IndexConfig::default(),
            answer: AnswerConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.runs.root.as_os_str().is_empty() {
        anyhow::bail!("runs.root must not be empty");
    }

    if config.acquisition.limit == 0 {
        anyhow::bail!("acquisition.limit must be > 0");
    }

    if config.index.batch_size == 0 {
        anyhow::bail!("index.batch_size must be > 0");
    }
    if config.index.top_k == 0 {
        anyhow::bail!("index.top_k must be > 0");
    }
    if config.index.name.trim().is_empty() {
        anyhow::bail!("index.name must not be empty");
    }

    if config.answer.max_context_chars == 0 {
        anyhow::bail!("answer.max_context_chars must be > 0");
    }

    match config.platform.provider.as_str() {
        "reddit" => {}
        other => anyhow::bail!("Unknown platform provider: '{}'. Must be reddit.", other),
    }

    match config.index.provider.as_str() {
        "pinecone" | "memory" => {}
        other => anyhow::bail!(
            "Unknown index provider: '{}'. Must be pinecone or memory.",
            other
        ),
    }

    match config.answer.provider.as_str() {
        "disabled" | "gemini" => {}
        other => anyhow::bail!(
            "Unknown answer provider: '{}'. Must be disabled or gemini.",
            other
        ),
    }

    Ok(())
}
