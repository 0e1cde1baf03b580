use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub questions: QuestionsConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

fn default_include_globs() -> Vec<String> {
    vec!["**/content.csv".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct QuestionsConfig {
    #[serde(default = "default_questions_path")]
    pub path: PathBuf,
    #[serde(default = "default_organization_column")]
    pub organization_column: String,
    #[serde(default = "default_question_column")]
    pub question_column: String,
}

impl Default for QuestionsConfig {
    fn default() -> Self {
        Self {
            path: default_questions_path(),
            organization_column: default_organization_column(),
            question_column: default_question_column(),
        }
    }
}

fn default_questions_path() -> PathBuf {
    PathBuf::from("./sdg17_questions.csv")
}
fn default_organization_column() -> String {
    "Organization".to_string()
}
fn default_question_column() -> String {
    "SDG Question".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_keyword_count")]
    pub keyword_count: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            threshold: default_threshold(),
            top_k: default_top_k(),
            keyword_count: default_keyword_count(),
        }
    }
}

fn default_mode() -> String {
    "semantic".to_string()
}
fn default_threshold() -> f32 {
    0.4
}
fn default_top_k() -> usize {
    8
}
fn default_keyword_count() -> usize {
    6
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
            url: None,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
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

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_output_path")]
    pub path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
        }
    }
}

fn default_output_path() -> PathBuf {
    PathBuf::from("./sdg17_questions_with_filtered_content.csv")
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

impl Config {
    /// In-code defaults, for callers without a config file.
    ///
    /// Uses the offline `hash` provider so the result passes [`validate`]
    /// in the default semantic mode.
    pub fn minimal() -> Self {
        Self {
            corpus: CorpusConfig {
                root: PathBuf::from("./output"),
                include_globs: default_include_globs(),
                exclude_globs: Vec::new(),
                follow_symlinks: false,
            },
            questions: QuestionsConfig::default(),
            retrieval: RetrievalConfig::default(),
            embedding: EmbeddingConfig {
                provider: "hash".to_string(),
                ..EmbeddingConfig::default()
            },
            output: OutputConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let config = read_config(path)?;
    validate(&config)?;
    Ok(config)
}

/// Parse without cross-field validation, for callers that apply overrides first.
pub fn read_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    toml::from_str(&content).with_context(|| "Failed to parse config file")
}

/// Check cross-field constraints. Also run after CLI overrides are applied.
pub fn validate(config: &Config) -> Result<()> {
    // Validate retrieval
    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    if !(-1.0..=1.0).contains(&config.retrieval.threshold) {
        anyhow::bail!("retrieval.threshold must be in [-1.0, 1.0]");
    }

    if config.retrieval.keyword_count < 1 {
        anyhow::bail!("retrieval.keyword_count must be >= 1");
    }

    match config.retrieval.mode.as_str() {
        "semantic" => {
            if !config.embedding.is_enabled() {
                anyhow::bail!(
                    "retrieval.mode 'semantic' requires embeddings. Set [embedding] provider in config."
                );
            }
        }
        "keyword" => {}
        other => anyhow::bail!(
            "Unknown retrieval mode: '{}'. Must be semantic or keyword.",
            other
        ),
    }

    // Validate embedding
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "hash" | "local" => {}
        "openai" | "ollama" => {
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                anyhow::bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, hash, openai, ollama, or local.",
            other
        ),
    }

    if config.embedding.dims == Some(0) {
        anyhow::bail!("embedding.dims must be > 0");
    }

    Ok(())
}
