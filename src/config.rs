use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Application configuration, loaded from a TOML file.
///
/// Every field has a serde default, so a missing config file (or an empty
/// one) yields a fully working configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub guardrail: GuardrailConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `"ollama"`, `"openai"`, or `"hash"` (deterministic, offline).
    #[serde(default = "default_embed_provider")]
    pub provider: String,
    #[serde(default = "default_embed_model")]
    pub model: String,
    /// Vector dimensionality. The hash provider uses this directly; HTTP
    /// providers report it for diagnostics.
    #[serde(default = "default_dims")]
    pub dims: usize,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embed_provider(),
            model: default_embed_model(),
            dims: default_dims(),
            url: None,
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embed_provider() -> String {
    "hash".to_string()
}
fn default_embed_model() -> String {
    "all-minilm-l6-v2".to_string()
}
fn default_dims() -> usize {
    384
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    /// `"ollama"` or `"openai"`.
    #[serde(default = "default_gen_provider")]
    pub provider: String,
    #[serde(default = "default_gen_model")]
    pub model: String,
    #[serde(default)]
    pub url: Option<String>,
    /// Upper bound on generated tokens.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Sampling temperature. Non-zero means answers are not reproducible
    /// across calls with identical input.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_gen_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_gen_provider(),
            model: default_gen_model(),
            url: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_gen_timeout_secs(),
        }
    }
}

fn default_gen_provider() -> String {
    "ollama".to_string()
}
fn default_gen_model() -> String {
    "llama3.2".to_string()
}
fn default_max_tokens() -> u32 {
    256
}
fn default_temperature() -> f32 {
    0.3
}
fn default_gen_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Target size (chars) for the `fixed` strategy.
    #[serde(default = "default_fixed_chunk_size")]
    pub fixed_chunk_size: usize,
    /// Target size (chars) for the `medium` strategy.
    #[serde(default = "default_medium_chunk_size")]
    pub medium_chunk_size: usize,
    /// Trailing context (chars) repeated at the start of the next chunk.
    /// The `sentence` strategy ignores it.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            fixed_chunk_size: default_fixed_chunk_size(),
            medium_chunk_size: default_medium_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_fixed_chunk_size() -> usize {
    500
}
fn default_medium_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Number of passages retrieved per query.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct EvaluationConfig {
    /// Passages sampled per evaluation run. Short passages are skipped
    /// without replacement, so fewer queries than this is a valid outcome.
    #[serde(default = "default_num_samples")]
    pub num_samples: usize,
    /// Minimum passage length (chars) to qualify as an eval sample.
    #[serde(default = "default_min_passage_chars")]
    pub min_passage_chars: usize,
    /// Word-overlap ratio at or above which a retrieved passage counts as
    /// a hit.
    #[serde(default = "default_overlap_threshold")]
    pub overlap_threshold: f64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            num_samples: default_num_samples(),
            min_passage_chars: default_min_passage_chars(),
            overlap_threshold: default_overlap_threshold(),
        }
    }
}

fn default_num_samples() -> usize {
    5
}
fn default_min_passage_chars() -> usize {
    20
}
fn default_overlap_threshold() -> f64 {
    0.3
}

#[derive(Debug, Deserialize, Clone)]
pub struct GuardrailConfig {
    /// Maximum accepted query length in characters (after trimming).
    #[serde(default = "default_max_query_chars")]
    pub max_query_chars: usize,
    /// Instruction-override / prompt-injection phrasings.
    #[serde(default = "default_injection_patterns")]
    pub injection_patterns: Vec<String>,
    /// Structured-query-language injection keywords.
    #[serde(default = "default_sql_patterns")]
    pub sql_patterns: Vec<String>,
    /// Shell command-injection sequences.
    #[serde(default = "default_command_patterns")]
    pub command_patterns: Vec<String>,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            max_query_chars: default_max_query_chars(),
            injection_patterns: default_injection_patterns(),
            sql_patterns: default_sql_patterns(),
            command_patterns: default_command_patterns(),
        }
    }
}

fn default_max_query_chars() -> usize {
    500
}

fn default_injection_patterns() -> Vec<String> {
    [
        r"ignore\s+(all\s+)?previous\s+instructions",
        r"ignore\s+the\s+above",
        r"disregard\s+(all\s+)?previous",
        r"you\s+are\s+now\s+a",
        r"act\s+as\s+if",
        r"pretend\s+you\s+are",
        r"system\s*prompt",
        r"reveal\s+(your|the)\s+(instructions|prompt|system)",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_sql_patterns() -> Vec<String> {
    [
        r"\b(SELECT|INSERT|UPDATE|DELETE|DROP|ALTER|UNION)\b\s",
        r"(--|;)\s*(SELECT|DROP|INSERT)",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_command_patterns() -> Vec<String> {
    [r"(&&|\|\|)\s*(rm|del|format|shutdown)", r"<script\b"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Directory uploaded files are written to before indexing.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            upload_dir: default_upload_dir(),
            max_file_size_mb: default_max_file_size_mb(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}
fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}
fn default_max_file_size_mb() -> u64 {
    10
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.fixed_chunk_size == 0 || config.chunking.medium_chunk_size == 0 {
        anyhow::bail!("chunking sizes must be > 0");
    }

    if config.chunking.chunk_overlap >= config.chunking.fixed_chunk_size {
        anyhow::bail!(
            "chunking.chunk_overlap must be smaller than chunking.fixed_chunk_size ({} >= {})",
            config.chunking.chunk_overlap,
            config.chunking.fixed_chunk_size
        );
    }

    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    if !(0.0..=1.0).contains(&config.evaluation.overlap_threshold) {
        anyhow::bail!("evaluation.overlap_threshold must be in [0.0, 1.0]");
    }

    match config.embedding.provider.as_str() {
        "ollama" | "openai" | "hash" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be ollama, openai, or hash.",
            other
        ),
    }

    match config.generation.provider.as_str() {
        "ollama" | "openai" => {}
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be ollama or openai.",
            other
        ),
    }

    Ok(())
}
